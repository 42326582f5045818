use tracing::debug;

use crate::config::selectors::SizeChartSelectors;
use crate::models::SizeChart;
use crate::scraper::{Locator, Page};

/// Header cells first, then one row per matched row element.
///
/// Rows without any cell are dropped. Rows are not padded to the header
/// width.
pub async fn extract_size_chart<P: Page>(locator: &Locator<'_, P>, selectors: &SizeChartSelectors) -> SizeChart {
    let headers = locator.texts_of(&selectors.header_cell).await;
    let rows = locator.find_all(&selectors.row).await;

    if headers.is_empty() && rows.is_empty() {
        return SizeChart::default();
    }

    let mut measurements = Vec::with_capacity(rows.len() + 1);
    measurements.push(headers.clone());

    let mut dropped = 0;
    for row in &rows {
        let cells = locator.texts_in(row, &selectors.cell).await;
        if cells.is_empty() {
            dropped += 1;
            continue;
        }
        measurements.push(cells);
    }

    let chart = SizeChart {
        column_headers: headers,
        measurements,
    };

    if dropped > 0 || chart.ragged_rows() > 0 {
        debug!(
            "Size chart: {} rows, {} empty rows dropped, {} rows differ from header width",
            rows.len(),
            dropped,
            chart.ragged_rows()
        );
    }

    chart
}
