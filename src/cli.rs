//! Command-line interface definitions and argument parsing

use crate::report::ReportFormat;
use crate::schema::{
    AddOn, Contract, CustomerFields, Gender, InternetService, MultipleLines, PaymentMethod, YesNo,
};
use anyhow::Context;
use clap::Parser;
use std::fs;
use std::path::PathBuf;

/// Telco customer churn prediction using a pre-trained classification pipeline
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the trained pipeline artifact (JSON)
    #[arg(short, long, default_value = "models/telco_churn_logreg.json")]
    pub model: PathBuf,

    /// Read the customer fields from a JSON form file keyed by column name
    #[arg(long, conflicts_with = "batch")]
    pub form: Option<PathBuf>,

    /// Batch mode: score every customer in a Telco-format CSV file
    #[arg(short, long)]
    pub batch: Option<String>,

    /// Directory that receives the generated report
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Report file format
    #[arg(long, value_enum, default_value_t = ReportFormat::Pdf)]
    pub format: ReportFormat,

    /// Skip writing a report file
    #[arg(long)]
    pub no_report: bool,

    /// Print the prediction as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Batch mode: where to write per-customer predictions
    #[arg(long, default_value = "churn_predictions.csv")]
    pub predictions: String,

    /// Batch mode: where to write the summary chart (SVG)
    #[arg(long, default_value = "churn_summary.svg")]
    pub chart: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(flatten)]
    pub customer: CustomerArgs,
}

/// One flag per captured field, defaulting to a blank form
#[derive(clap::Args, Debug, Clone)]
#[command(next_help_heading = "Customer details")]
pub struct CustomerArgs {
    /// Customer ID (optional)
    #[arg(long, default_value = "")]
    pub customer_id: String,

    #[arg(long, value_enum, default_value_t = Gender::Male)]
    pub gender: Gender,

    #[arg(long, value_enum, default_value_t = YesNo::No)]
    pub senior_citizen: YesNo,

    #[arg(long, value_enum, default_value_t = YesNo::No)]
    pub partner: YesNo,

    #[arg(long, value_enum, default_value_t = YesNo::No)]
    pub dependents: YesNo,

    /// Tenure in months
    #[arg(long, default_value_t = 12, value_parser = clap::value_parser!(u32).range(0..=100))]
    pub tenure: u32,

    #[arg(long, value_enum, default_value_t = YesNo::No)]
    pub phone_service: YesNo,

    #[arg(long, value_enum, default_value_t = MultipleLines::No)]
    pub multiple_lines: MultipleLines,

    #[arg(long, value_enum, default_value_t = InternetService::Dsl)]
    pub internet_service: InternetService,

    #[arg(long, value_enum, default_value_t = AddOn::No)]
    pub online_security: AddOn,

    #[arg(long, value_enum, default_value_t = AddOn::No)]
    pub online_backup: AddOn,

    #[arg(long, value_enum, default_value_t = AddOn::No)]
    pub device_protection: AddOn,

    #[arg(long, value_enum, default_value_t = AddOn::No)]
    pub tech_support: AddOn,

    #[arg(long, value_enum, default_value_t = AddOn::No)]
    pub streaming_tv: AddOn,

    #[arg(long, value_enum, default_value_t = AddOn::No)]
    pub streaming_movies: AddOn,

    #[arg(long, value_enum, default_value_t = Contract::MonthToMonth)]
    pub contract: Contract,

    #[arg(long, value_enum, default_value_t = YesNo::No)]
    pub paperless_billing: YesNo,

    #[arg(long, value_enum, default_value_t = PaymentMethod::ElectronicCheck)]
    pub payment_method: PaymentMethod,

    #[arg(long, default_value = "50.00", value_parser = parse_amount)]
    pub monthly_charges: f64,

    #[arg(long, default_value = "500.00", value_parser = parse_amount)]
    pub total_charges: f64,
}

impl From<&CustomerArgs> for CustomerFields {
    fn from(args: &CustomerArgs) -> Self {
        CustomerFields {
            customer_id: args.customer_id.clone(),
            gender: args.gender,
            senior_citizen: args.senior_citizen,
            partner: args.partner,
            dependents: args.dependents,
            tenure: args.tenure,
            phone_service: args.phone_service,
            multiple_lines: args.multiple_lines,
            internet_service: args.internet_service,
            online_security: args.online_security,
            online_backup: args.online_backup,
            device_protection: args.device_protection,
            tech_support: args.tech_support,
            streaming_tv: args.streaming_tv,
            streaming_movies: args.streaming_movies,
            contract: args.contract,
            paperless_billing: args.paperless_billing,
            payment_method: args.payment_method,
            monthly_charges: args.monthly_charges,
            total_charges: args.total_charges,
        }
    }
}

/// Parse a non-negative currency amount
fn parse_amount(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("invalid amount: {}", s))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("amount must be non-negative: {}", s));
    }
    Ok(value)
}

impl Args {
    /// Captured fields for single-customer mode, from the form file when one
    /// is given and from the flags otherwise
    pub fn customer_fields(&self) -> crate::Result<CustomerFields> {
        let fields = match &self.form {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("failed to read form {}", path.display()))?;
                serde_json::from_str::<CustomerFields>(&raw)
                    .with_context(|| format!("invalid form {}", path.display()))?
            }
            None => CustomerFields::from(&self.customer),
        };
        fields.validate()?;
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_blank_form() {
        let args = Args::try_parse_from(["churnforge"]).unwrap();

        assert_eq!(args.model, PathBuf::from("models/telco_churn_logreg.json"));
        assert_eq!(args.format, ReportFormat::Pdf);
        assert!(args.batch.is_none());
        assert_eq!(args.customer_fields().unwrap(), CustomerFields::default());
    }

    #[test]
    fn test_parse_customer_flags() {
        let args = Args::try_parse_from([
            "churnforge",
            "--customer-id",
            "9305-CDSKC",
            "--senior-citizen",
            "yes",
            "--tenure",
            "8",
            "--internet-service",
            "fiber-optic",
            "--streaming-tv",
            "no-internet-service",
            "--contract",
            "two-year",
            "--payment-method",
            "credit-card",
            "--monthly-charges",
            "99.65",
            "--format",
            "text",
        ])
        .unwrap();

        let fields = args.customer_fields().unwrap();
        assert_eq!(fields.customer_id, "9305-CDSKC");
        assert_eq!(fields.senior_citizen, YesNo::Yes);
        assert_eq!(fields.tenure, 8);
        assert_eq!(fields.internet_service, InternetService::FiberOptic);
        assert_eq!(fields.streaming_tv, AddOn::NoInternetService);
        assert_eq!(fields.contract, Contract::TwoYear);
        assert_eq!(fields.payment_method, PaymentMethod::CreditCard);
        assert_eq!(fields.monthly_charges, 99.65);
        assert_eq!(args.format, ReportFormat::Text);
    }

    #[test]
    fn test_invalid_flags_are_rejected() {
        assert!(Args::try_parse_from(["churnforge", "--tenure", "101"]).is_err());
        assert!(Args::try_parse_from(["churnforge", "--tenure", "-1"]).is_err());
        assert!(Args::try_parse_from(["churnforge", "--monthly-charges", "-5"]).is_err());
        assert!(Args::try_parse_from(["churnforge", "--contract", "weekly"]).is_err());
        assert!(Args::try_parse_from(["churnforge", "--form", "a.json", "--batch", "b.csv"]).is_err());
    }

    #[test]
    fn test_form_file_overrides_flags() {
        let mut form = NamedTempFile::new().unwrap();
        write!(
            form,
            r#"{{"customerID": "1452-KIOVK", "SeniorCitizen": 1, "tenure": 22, "Contract": "One year"}}"#
        )
        .unwrap();

        let args = Args::try_parse_from([
            "churnforge",
            "--tenure",
            "3",
            "--form",
            form.path().to_str().unwrap(),
        ])
        .unwrap();
        let fields = args.customer_fields().unwrap();

        assert_eq!(fields.customer_id, "1452-KIOVK");
        assert_eq!(fields.senior_citizen, YesNo::Yes);
        assert_eq!(fields.tenure, 22);
        assert_eq!(fields.contract, Contract::OneYear);
    }

    #[test]
    fn test_form_file_is_validated() {
        let mut form = NamedTempFile::new().unwrap();
        write!(form, r#"{{"MonthlyCharges": -20.0}}"#).unwrap();

        let args =
            Args::try_parse_from(["churnforge", "--form", form.path().to_str().unwrap()]).unwrap();
        assert!(args.customer_fields().is_err());
    }

    #[test]
    fn test_form_file_rejects_misspelled_keys() {
        let mut form = NamedTempFile::new().unwrap();
        write!(form, r#"{{"Tenure": 60, "contract": "Two year"}}"#).unwrap();

        let args =
            Args::try_parse_from(["churnforge", "--form", form.path().to_str().unwrap()]).unwrap();
        let err = args.customer_fields().unwrap_err();
        assert!(format!("{:#}", err).contains("unknown field"));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("70.00"), Ok(70.0));
        assert_eq!(parse_amount(" 0 "), Ok(0.0));
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("-0.01").is_err());
        assert!(parse_amount("inf").is_err());
    }
}
