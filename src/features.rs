//! Canonical feature layout shared by the models, the service and the dashboard

/// Number of model input features.
pub const N_FEATURES: usize = 9;

/// Model input columns, in the order every classifier expects them.
pub const FEATURE_COLUMNS: [&str; N_FEATURES] = [
    "CreditScore",
    "Age",
    "Tenure",
    "Balance",
    "NumOfProducts",
    "HasCrCard",
    "IsActiveMember",
    "EstimatedSalary",
    "Gender_Male",
];

/// Localized display labels, index-aligned with [`FEATURE_COLUMNS`].
pub const FEATURE_LABELS: [&str; N_FEATURES] = [
    "Кредитный рейтинг",
    "Возраст",
    "Стаж (лет)",
    "Баланс",
    "Кол-во продуктов",
    "Наличие кредитной карты",
    "Активность",
    "Оценочная зарплата",
    "Пол",
];

pub const GENDER_MALE_COLUMN: &str = "Gender_Male";
pub const GENDER_COLUMN: &str = "Gender";
pub const CUSTOMER_ID_COLUMN: &str = "CustomerId";
pub const GEOGRAPHY_COLUMN: &str = "Geography";
