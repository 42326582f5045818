use rand::seq::SliceRandom;
use std::sync::Arc;

/// Picks a user agent per session from the configured list
#[derive(Clone)]
pub struct UserAgentRotator {
    user_agents: Arc<Vec<String>>,
}

impl UserAgentRotator {
    pub fn new(user_agents: &[String]) -> Self {
        let agents = if user_agents.is_empty() {
            Self::default_user_agents()
        } else {
            user_agents.to_vec()
        };

        Self {
            user_agents: Arc::new(agents),
        }
    }

    /// Get a random user agent
    pub fn get_random_user_agent(&self) -> &str {
        let mut rng = rand::thread_rng();
        self.user_agents
            .choose(&mut rng)
            .map(String::as_str)
            .unwrap_or(DEFAULT_USER_AGENT)
    }

    /// Get count of available user agents
    pub fn count(&self) -> usize {
        self.user_agents.len()
    }

    fn default_user_agents() -> Vec<String> {
        vec![
            DEFAULT_USER_AGENT.to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        ]
    }
}

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
