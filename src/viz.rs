//! Batch summary statistics and charts using Plotters

use crate::model::{ChurnLabel, PredictionResult};
use plotters::prelude::*;

/// Number of equal-width probability buckets over [0, 1]
pub const PROBABILITY_BINS: usize = 10;

const CHURN_COLOR: RGBColor = RGBColor(200, 30, 30);
const RETAIN_COLOR: RGBColor = RGBColor(30, 130, 30);

/// Aggregate view of a batch of predictions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub churn: usize,
    pub no_churn: usize,
    /// Predictions that carried a probability
    pub with_probability: usize,
    pub probability_bins: [usize; PROBABILITY_BINS],
}

impl BatchSummary {
    pub fn from_results(results: &[PredictionResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            churn: 0,
            no_churn: 0,
            with_probability: 0,
            probability_bins: [0; PROBABILITY_BINS],
        };

        for result in results {
            match result.label {
                ChurnLabel::Churn => summary.churn += 1,
                ChurnLabel::NoChurn => summary.no_churn += 1,
            }
            if let Some(p) = result.probability {
                summary.with_probability += 1;
                summary.probability_bins[probability_bin(p)] += 1;
            }
        }
        summary
    }

    /// Share of customers predicted to churn, in percent
    pub fn churn_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.churn as f64 / self.total as f64 * 100.0
        }
    }
}

/// Bucket index for a probability; 1.0 falls in the last bucket
fn probability_bin(p: f64) -> usize {
    ((p * PROBABILITY_BINS as f64) as usize).min(PROBABILITY_BINS - 1)
}

/// Print batch statistics to console
pub fn print_batch_statistics(summary: &BatchSummary) {
    println!("\n=== Batch Statistics ===");
    println!("Total customers: {}", summary.total);
    println!(
        "Likely to churn: {} ({:.1}%)",
        summary.churn,
        summary.churn_rate()
    );
    println!(
        "Not likely to churn: {} ({:.1}%)",
        summary.no_churn,
        100.0 - summary.churn_rate()
    );

    if summary.with_probability == 0 {
        println!("\nNo churn probabilities available for this model.");
        return;
    }

    println!("\nChurn probability distribution:");
    println!("  Range       | Customers");
    println!("  ------------|----------");
    for (i, &count) in summary.probability_bins.iter().enumerate() {
        let low = i as f64 / PROBABILITY_BINS as f64;
        let high = (i + 1) as f64 / PROBABILITY_BINS as f64;
        println!("  {:.1} - {:.1}   | {:9}", low, high, count);
    }
}

/// Draw predicted label counts next to the probability histogram as SVG
pub fn create_batch_chart(summary: &BatchSummary, output_path: &str) -> crate::Result<()> {
    let root = SVGBackend::new(output_path, (1000, 420)).into_drawing_area();
    root.fill(&WHITE)?;
    let (left, right) = root.split_horizontally(420);

    let max_count = summary.churn.max(summary.no_churn).max(1) as f64;
    let mut labels = ChartBuilder::on(&left)
        .caption("Predicted Labels", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..2f64, 0f64..(max_count * 1.1))?;

    labels
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(0)
        .x_desc("Churn | No churn")
        .y_desc("Customers")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (slot, (count, color)) in [(summary.churn, CHURN_COLOR), (summary.no_churn, RETAIN_COLOR)]
        .into_iter()
        .enumerate()
    {
        let x = slot as f64;
        labels.draw_series(std::iter::once(Rectangle::new(
            [(x + 0.15, 0.0), (x + 0.85, count as f64)],
            color.filled(),
        )))?;
    }

    let max_bin = summary.probability_bins.iter().copied().max().unwrap_or(0).max(1) as f64;
    let mut histogram = ChartBuilder::on(&right)
        .caption("Churn Probability", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..1f64, 0f64..(max_bin * 1.1))?;

    histogram
        .configure_mesh()
        .x_desc("Probability of churn")
        .y_desc("Customers")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    let width = 1.0 / PROBABILITY_BINS as f64;
    histogram.draw_series(summary.probability_bins.iter().enumerate().map(|(i, &count)| {
        let low = i as f64 * width;
        let color = if low >= 0.5 { CHURN_COLOR } else { RETAIN_COLOR };
        Rectangle::new([(low + 0.005, 0.0), (low + width - 0.005, count as f64)], color.filled())
    }))?;

    root.present()?;
    println!("Batch chart saved to: {}", output_path);

    Ok(())
}
