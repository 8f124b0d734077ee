//! Batch input and output of customer data using Polars

use crate::model::PredictionResult;
use crate::schema::{
    CustomerFields, CustomerRecord, YesNo, CUSTOMER_ID, MONTHLY_CHARGES, SENIOR_CITIZEN, TENURE,
    TOTAL_CHARGES,
};
use anyhow::Context;
use log::warn;
use polars::prelude::*;
use std::fs::File;
use std::str::FromStr;

/// Load customers from a CSV in the Telco dataset layout
///
/// Columns are matched by their training names. Extra columns (such as the
/// `Churn` ground truth) are ignored and a missing `customerID` column leaves
/// every ID blank. A blank `TotalCharges`, which the public dataset contains
/// for brand-new customers, is read as 0.0.
pub fn load_customers(file_path: &str) -> crate::Result<Vec<CustomerFields>> {
    // Read every column as text so category spellings survive untouched
    let df = CsvReader::from_path(file_path)
        .with_context(|| format!("failed to open customer file {}", file_path))?
        .has_header(true)
        .infer_schema(Some(0))
        .finish()
        .with_context(|| format!("failed to parse customer file {}", file_path))?;

    if df.height() == 0 {
        anyhow::bail!("No customers found in {}", file_path);
    }

    let table = TextTable { df: &df };
    let ids = table.optional(CUSTOMER_ID)?;

    let mut customers = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let fields = table
            .customer(row, ids)
            .with_context(|| format!("row {} of {}", row + 1, file_path))?;
        customers.push(fields);
    }
    Ok(customers)
}

/// Text-typed view over the loaded frame
struct TextTable<'a> {
    df: &'a DataFrame,
}

impl<'a> TextTable<'a> {
    fn column(&self, name: &str) -> crate::Result<&'a StringChunked> {
        self.df
            .column(name)
            .with_context(|| format!("missing column '{}'", name))?
            .str()
            .with_context(|| format!("column '{}' is not text", name))
    }

    fn optional(&self, name: &str) -> crate::Result<Option<&'a StringChunked>> {
        if self.df.get_column_names().contains(&name) {
            self.column(name).map(Some)
        } else {
            Ok(None)
        }
    }

    fn value(&self, name: &str, row: usize) -> crate::Result<&'a str> {
        Ok(self.column(name)?.get(row).unwrap_or("").trim())
    }

    fn category<T>(&self, name: &str, row: usize) -> crate::Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        Ok(self.value(name, row)?.parse::<T>()?)
    }

    fn amount(&self, name: &str, row: usize) -> crate::Result<f64> {
        let raw = self.value(name, row)?;
        if raw.is_empty() {
            warn!("Blank {} at row {}, using 0.00", name, row + 1);
            return Ok(0.0);
        }
        raw.parse::<f64>()
            .with_context(|| format!("invalid {} value {:?}", name, raw))
    }

    fn customer(&self, row: usize, ids: Option<&StringChunked>) -> crate::Result<CustomerFields> {
        let senior_raw = self.value(SENIOR_CITIZEN, row)?;
        let senior_citizen = match senior_raw.parse::<i64>() {
            Ok(flag) => YesNo::from_flag(flag),
            Err(_) => senior_raw.parse::<YesNo>().ok(),
        }
        .with_context(|| format!("invalid {} value {:?}", SENIOR_CITIZEN, senior_raw))?;

        let tenure_raw = self.value(TENURE, row)?;
        let tenure = tenure_raw
            .parse::<u32>()
            .with_context(|| format!("invalid {} value {:?}", TENURE, tenure_raw))?;

        let fields = CustomerFields {
            customer_id: ids
                .and_then(|ids| ids.get(row))
                .unwrap_or("")
                .trim()
                .to_string(),
            gender: self.category("gender", row)?,
            senior_citizen,
            partner: self.category("Partner", row)?,
            dependents: self.category("Dependents", row)?,
            tenure,
            phone_service: self.category("PhoneService", row)?,
            multiple_lines: self.category("MultipleLines", row)?,
            internet_service: self.category("InternetService", row)?,
            online_security: self.category("OnlineSecurity", row)?,
            online_backup: self.category("OnlineBackup", row)?,
            device_protection: self.category("DeviceProtection", row)?,
            tech_support: self.category("TechSupport", row)?,
            streaming_tv: self.category("StreamingTV", row)?,
            streaming_movies: self.category("StreamingMovies", row)?,
            contract: self.category("Contract", row)?,
            paperless_billing: self.category("PaperlessBilling", row)?,
            payment_method: self.category("PaymentMethod", row)?,
            monthly_charges: self.amount(MONTHLY_CHARGES, row)?,
            total_charges: self.amount(TOTAL_CHARGES, row)?,
        };
        fields.validate()?;
        Ok(fields)
    }
}

/// Stack records into one frame, one row per customer
pub fn records_to_frame(records: &[CustomerRecord]) -> crate::Result<DataFrame> {
    let (first, rest) = records
        .split_first()
        .context("cannot build a frame from zero records")?;

    let mut frame = first.to_frame()?;
    for record in rest {
        frame.vstack_mut(&record.to_frame()?)?;
    }
    Ok(frame)
}

/// Write input columns plus `Prediction` and `ChurnProbability` as CSV
pub fn write_predictions(
    output_path: &str,
    records: &[CustomerRecord],
    results: &[PredictionResult],
) -> crate::Result<()> {
    if records.len() != results.len() {
        anyhow::bail!(
            "{} records but {} prediction results",
            records.len(),
            results.len()
        );
    }

    let mut frame = records_to_frame(records)?;
    let labels: Vec<&str> = results.iter().map(|r| r.label.as_str()).collect();
    let probabilities: Vec<Option<f64>> = results.iter().map(|r| r.probability).collect();
    frame.with_column(Series::new("Prediction", labels))?;
    frame.with_column(Series::new("ChurnProbability", probabilities))?;

    let mut file = File::create(output_path)
        .with_context(|| format!("failed to create {}", output_path))?;
    CsvWriter::new(&mut file)
        .finish(&mut frame)
        .with_context(|| format!("failed to write predictions to {}", output_path))?;
    Ok(())
}
