use thiserror::Error;

/// Everything that can stop a page from rendering, one variant per failure kind.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("could not resolve ticker {symbol}: {reason}")]
    Resolve { symbol: String, reason: String },

    #[error("could not fetch price history for {symbol}: {reason}")]
    Fetch { symbol: String, reason: String },

    #[error("insufficient data: {have} rows available, at least {need} required")]
    InsufficientData { have: usize, need: usize },

    #[error("could not render {chart}: {reason}")]
    Render { chart: String, reason: String },

    #[error("model fitting failed: {0}")]
    Model(String),
}

impl AppError {
    pub fn resolve(symbol: &str, reason: impl ToString) -> Self {
        Self::Resolve {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn fetch(symbol: &str, reason: impl ToString) -> Self {
        Self::Fetch {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn render(chart: &str, reason: impl ToString) -> Self {
        Self::Render {
            chart: chart.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Short message shown to the user in place of the results area.
    pub fn user_message(&self) -> String {
        match self {
            Self::Resolve { symbol, .. } => format!(
                "Ticker symbol \"{}\" could not be found. Check the symbol and try again.",
                symbol
            ),
            Self::Fetch { symbol, .. } => format!(
                "Price history for {} could not be retrieved from the market-data provider.",
                symbol
            ),
            Self::InsufficientData { have, need } => format!(
                "Not enough price history to forecast: {} trading days available, {} needed.",
                have, need
            ),
            Self::Render { chart, .. } => format!("The {} chart could not be drawn.", chart),
            Self::Model(_) => "The forecast model could not be fitted to this data.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_are_distinct() {
        let errors = [
            AppError::resolve("ZZZZZZ", "HTTP 404"),
            AppError::fetch("AAPL", "empty result"),
            AppError::InsufficientData { have: 10, need: 40 },
            AppError::render("candlestick", "bad range"),
            AppError::Model("singular".into()),
        ];
        let messages: Vec<String> = errors.iter().map(|e| e.user_message()).collect();
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(messages[0].contains("ZZZZZZ"));
        assert!(messages[2].contains("10") && messages[2].contains("40"));
    }

    #[test]
    fn test_display_keeps_reason() {
        let err = AppError::fetch("AAPL", "HTTP 500");
        assert_eq!(
            err.to_string(),
            "could not fetch price history for AAPL: HTTP 500"
        );
    }
}
