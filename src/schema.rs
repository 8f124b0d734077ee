//! Schema mapping from captured customer fields to the pipeline's input record
//!
//! Column names and category spellings here are the exact strings the churn
//! pipeline was fit on. They are case-sensitive: a renamed column or a
//! respelled category silently changes what the model sees.

use crate::error::UnknownCategory;
use clap::ValueEnum;
use polars::prelude::{DataFrame, NamedFrom, PolarsResult, Series};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const CUSTOMER_ID: &str = "customerID";
pub const SENIOR_CITIZEN: &str = "SeniorCitizen";
pub const TENURE: &str = "tenure";
pub const MONTHLY_CHARGES: &str = "MonthlyCharges";
pub const TOTAL_CHARGES: &str = "TotalCharges";

/// Upper bound the capture form offers for tenure
pub const MAX_TENURE_MONTHS: u32 = 100;

/// Training columns in dataset order
pub const COLUMNS: [&str; 20] = [
    CUSTOMER_ID,
    "gender",
    SENIOR_CITIZEN,
    "Partner",
    "Dependents",
    TENURE,
    "PhoneService",
    "MultipleLines",
    "InternetService",
    "OnlineSecurity",
    "OnlineBackup",
    "DeviceProtection",
    "TechSupport",
    "StreamingTV",
    "StreamingMovies",
    "Contract",
    "PaperlessBilling",
    "PaymentMethod",
    MONTHLY_CHARGES,
    TOTAL_CHARGES,
];

/// Declares a categorical domain: the training label of each variant, plus the
/// kebab-case name accepted on the command line.
macro_rules! categorical {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($variant:ident => $label:literal as $arg:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[value(name = $arg)]
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            /// Every value of the domain, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Exact training-time spelling
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownCategory;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    other => Err(UnknownCategory {
                        field: $field,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

categorical! {
    /// Binary choice used by most yes/no columns
    YesNo, "yes/no" {
        No => "No" as "no",
        Yes => "Yes" as "yes",
    }
}

categorical! {
    Gender, "gender" {
        Male => "Male" as "male",
        Female => "Female" as "female",
    }
}

categorical! {
    MultipleLines, "MultipleLines" {
        No => "No" as "no",
        Yes => "Yes" as "yes",
        NoPhoneService => "No phone service" as "no-phone-service",
    }
}

categorical! {
    InternetService, "InternetService" {
        Dsl => "DSL" as "dsl",
        FiberOptic => "Fiber optic" as "fiber-optic",
        No => "No" as "no",
    }
}

categorical! {
    /// Shared domain of the internet add-on columns
    AddOn, "internet add-on" {
        No => "No" as "no",
        Yes => "Yes" as "yes",
        NoInternetService => "No internet service" as "no-internet-service",
    }
}

categorical! {
    Contract, "Contract" {
        MonthToMonth => "Month-to-month" as "month-to-month",
        OneYear => "One year" as "one-year",
        TwoYear => "Two year" as "two-year",
    }
}

categorical! {
    PaymentMethod, "PaymentMethod" {
        ElectronicCheck => "Electronic check" as "electronic-check",
        MailedCheck => "Mailed check" as "mailed-check",
        BankTransfer => "Bank transfer (automatic)" as "bank-transfer",
        CreditCard => "Credit card (automatic)" as "credit-card",
    }
}

impl YesNo {
    /// 0/1 encoding used for `SeniorCitizen`
    pub fn as_flag(self) -> i64 {
        match self {
            YesNo::No => 0,
            YesNo::Yes => 1,
        }
    }

    pub fn from_flag(flag: i64) -> Option<Self> {
        match flag {
            0 => Some(YesNo::No),
            1 => Some(YesNo::Yes),
            _ => None,
        }
    }
}

/// Field values as captured by a form, before mapping to the training schema
///
/// Keys must be the exact training column names; unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CustomerFields {
    #[serde(rename = "customerID")]
    pub customer_id: String,
    pub gender: Gender,
    #[serde(rename = "SeniorCitizen", deserialize_with = "senior_citizen_choice")]
    pub senior_citizen: YesNo,
    #[serde(rename = "Partner")]
    pub partner: YesNo,
    #[serde(rename = "Dependents")]
    pub dependents: YesNo,
    pub tenure: u32,
    #[serde(rename = "PhoneService")]
    pub phone_service: YesNo,
    #[serde(rename = "MultipleLines")]
    pub multiple_lines: MultipleLines,
    #[serde(rename = "InternetService")]
    pub internet_service: InternetService,
    #[serde(rename = "OnlineSecurity")]
    pub online_security: AddOn,
    #[serde(rename = "OnlineBackup")]
    pub online_backup: AddOn,
    #[serde(rename = "DeviceProtection")]
    pub device_protection: AddOn,
    #[serde(rename = "TechSupport")]
    pub tech_support: AddOn,
    #[serde(rename = "StreamingTV")]
    pub streaming_tv: AddOn,
    #[serde(rename = "StreamingMovies")]
    pub streaming_movies: AddOn,
    #[serde(rename = "Contract")]
    pub contract: Contract,
    #[serde(rename = "PaperlessBilling")]
    pub paperless_billing: YesNo,
    #[serde(rename = "PaymentMethod")]
    pub payment_method: PaymentMethod,
    #[serde(rename = "MonthlyCharges")]
    pub monthly_charges: f64,
    #[serde(rename = "TotalCharges")]
    pub total_charges: f64,
}

impl Default for CustomerFields {
    /// The values a blank capture form starts from
    fn default() -> Self {
        Self {
            customer_id: String::new(),
            gender: Gender::Male,
            senior_citizen: YesNo::No,
            partner: YesNo::No,
            dependents: YesNo::No,
            tenure: 12,
            phone_service: YesNo::No,
            multiple_lines: MultipleLines::No,
            internet_service: InternetService::Dsl,
            online_security: AddOn::No,
            online_backup: AddOn::No,
            device_protection: AddOn::No,
            tech_support: AddOn::No,
            streaming_tv: AddOn::No,
            streaming_movies: AddOn::No,
            contract: Contract::MonthToMonth,
            paperless_billing: YesNo::No,
            payment_method: PaymentMethod::ElectronicCheck,
            monthly_charges: 50.0,
            total_charges: 500.0,
        }
    }
}

impl CustomerFields {
    /// Range checks a capture widget performs on numeric inputs.
    ///
    /// Categorical fields need no check: their types only admit domain values.
    pub fn validate(&self) -> crate::Result<()> {
        if self.tenure > MAX_TENURE_MONTHS {
            anyhow::bail!(
                "tenure must be between 0 and {} months (got {})",
                MAX_TENURE_MONTHS,
                self.tenure
            );
        }
        for (name, value) in [
            (MONTHLY_CHARGES, self.monthly_charges),
            (TOTAL_CHARGES, self.total_charges),
        ] {
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("{} must be a non-negative amount (got {})", name, value);
            }
        }
        Ok(())
    }
}

/// Accepts "Yes"/"No" as well as the 0/1 flag the dataset stores
fn senior_citizen_choice<'de, D>(deserializer: D) -> Result<YesNo, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Flag(i64),
        Choice(YesNo),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Flag(flag) => YesNo::from_flag(flag).ok_or_else(|| {
            serde::de::Error::custom(format!("SeniorCitizen flag must be 0 or 1, got {}", flag))
        }),
        Raw::Choice(choice) => Ok(choice),
    }
}

/// A single value of the pipeline input, typed as the training dataframe was
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl FieldValue {
    /// Numeric view, `None` for text
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{:.2}", v),
        }
    }
}

/// One customer's values keyed by training column name, in column order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CustomerRecord {
    fields: Vec<(String, FieldValue)>,
}

impl CustomerRecord {
    pub fn from_pairs<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, FieldValue)>,
    {
        let mut record = Self::default();
        for (column, value) in pairs {
            record.insert(column, value);
        }
        record
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Set a column, replacing an existing value in place
    pub fn insert(&mut self, column: impl Into<String>, value: FieldValue) {
        let column = column.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn remove(&mut self, column: &str) -> Option<FieldValue> {
        let index = self.fields.iter().position(|(name, _)| name == column)?;
        Some(self.fields.remove(index).1)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Fields worth showing to a person: blank text (an empty customer ID) is
    /// left out
    pub fn display_fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.iter().filter(|(_, value)| !value.is_blank())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Short human label for log lines
    pub fn describe(&self) -> String {
        match self.get(CUSTOMER_ID) {
            Some(id) if !id.is_blank() => format!("customer {}", id),
            _ => "anonymous customer".to_string(),
        }
    }

    /// Single-row dataframe with the record's column names and dtypes
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let columns = self
            .fields
            .iter()
            .map(|(name, value)| match value {
                FieldValue::Text(s) => Series::new(name.as_str(), &[s.as_str()]),
                FieldValue::Int(v) => Series::new(name.as_str(), &[*v]),
                FieldValue::Float(v) => Series::new(name.as_str(), &[*v]),
            })
            .collect::<Vec<_>>();
        DataFrame::new(columns)
    }
}

impl Serialize for CustomerRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Map captured fields onto the training schema.
///
/// `SeniorCitizen` becomes its 0/1 flag; every other categorical keeps its
/// training string. `customerID` is always present, blank when not captured.
pub fn build_record(fields: &CustomerFields) -> CustomerRecord {
    let text = |value: &str| FieldValue::Text(value.to_string());

    CustomerRecord::from_pairs([
        (CUSTOMER_ID, text(fields.customer_id.trim())),
        ("gender", text(fields.gender.as_str())),
        (SENIOR_CITIZEN, FieldValue::Int(fields.senior_citizen.as_flag())),
        ("Partner", text(fields.partner.as_str())),
        ("Dependents", text(fields.dependents.as_str())),
        (TENURE, FieldValue::Int(i64::from(fields.tenure))),
        ("PhoneService", text(fields.phone_service.as_str())),
        ("MultipleLines", text(fields.multiple_lines.as_str())),
        ("InternetService", text(fields.internet_service.as_str())),
        ("OnlineSecurity", text(fields.online_security.as_str())),
        ("OnlineBackup", text(fields.online_backup.as_str())),
        ("DeviceProtection", text(fields.device_protection.as_str())),
        ("TechSupport", text(fields.tech_support.as_str())),
        ("StreamingTV", text(fields.streaming_tv.as_str())),
        ("StreamingMovies", text(fields.streaming_movies.as_str())),
        ("Contract", text(fields.contract.as_str())),
        ("PaperlessBilling", text(fields.paperless_billing.as_str())),
        ("PaymentMethod", text(fields.payment_method.as_str())),
        (MONTHLY_CHARGES, FieldValue::Float(fields.monthly_charges)),
        (TOTAL_CHARGES, FieldValue::Float(fields.total_charges)),
    ])
}
