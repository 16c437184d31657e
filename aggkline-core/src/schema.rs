use polars::prelude::*;

/// Positional schema of an aggregated-trades CSV entry (no header row).
pub struct TradeSchema;

impl TradeSchema {
    pub const AGG_TRADE_ID: &'static str = "agg_trade_id";
    pub const PRICE: &'static str = "price";
    pub const QUANTITY: &'static str = "quantity";
    pub const FIRST_TRADE_ID: &'static str = "first_trade_id";
    pub const LAST_TRADE_ID: &'static str = "last_trade_id";
    pub const TRANSACT_TIME: &'static str = "transact_time";
    pub const IS_BUYER_MAKER: &'static str = "is_buyer_maker";

    /// The canonical 7-column raw trade schema, in file order.
    pub fn schema() -> Schema {
        Schema::from_iter(vec![
            Field::new(Self::AGG_TRADE_ID.into(), DataType::Int64),
            Field::new(Self::PRICE.into(), DataType::Float64),
            Field::new(Self::QUANTITY.into(), DataType::Float64),
            Field::new(Self::FIRST_TRADE_ID.into(), DataType::Int64),
            Field::new(Self::LAST_TRADE_ID.into(), DataType::Int64),
            Field::new(Self::TRANSACT_TIME.into(), DataType::Int64),
            Field::new(Self::IS_BUYER_MAKER.into(), DataType::Boolean),
        ])
    }

    /// Validate DataFrame against schema
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        Self::validate_schema(&df.schema())
    }

    /// Validate a resolved schema, e.g. of a lazy scan, without collecting.
    pub fn validate_schema(actual: &Schema) -> Result<(), SchemaError> {
        let expected = Self::schema();

        for field in expected.iter_fields() {
            let actual_dtype = actual
                .get(field.name())
                .ok_or_else(|| SchemaError::MissingColumn(field.name().to_string()))?;
            if actual_dtype != field.dtype() {
                return Err(SchemaError::TypeMismatch {
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: actual_dtype.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Categorical dtype used for the low-cardinality tag columns.
pub fn categorical() -> DataType {
    DataType::Categorical(None, CategoricalOrdering::Physical)
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}
