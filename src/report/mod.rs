//! Render model for one page load and its HTML rendition.
//!
//! The pipeline produces a [`Report`]; the page wraps it together with the
//! request echo so that a failed run still shows the title, disclaimer and
//! input field, with a single error line in place of the results.

use crate::charts::Chart;
use crate::error::AppError;
use crate::features::FeatureTable;
use crate::forecast::ForecastOutcome;
use crate::models::CompanyProfile;
use crate::utils::{fmt_number, fmt_opt};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::Write as _;

/// Rows shown in the history table.
pub const HISTORY_TABLE_ROWS: usize = 250;

const TITLE: &str = "Stock price forecast";
const DISCLAIMER: &str = "Forecasts are produced by a simple statistical model and are for \
reference only. No liability is accepted for any loss arising from their use.";
const SYMBOL_REFERENCE_URL: &str =
    "https://search.sbisec.co.jp/v2/popwin/info/stock/pop6040_usequity_list.html";

// ── Render model ──────────────────────────────────────────────────────────────

/// One user interaction: the raw ticker text and whether forecast was pressed.
#[derive(Debug, Clone, Serialize)]
pub struct PageRequest {
    pub ticker: String,
    pub predict: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: f64,
    pub sma: Option<f64>,
    pub change: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ForecastView {
    Ready { outcome: ForecastOutcome, chart: Chart },
    Rejected { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub profile: CompanyProfile,
    pub start_date: NaiveDate,
    pub total_rows: usize,
    pub history: Vec<HistoryRow>,
    pub charts: Vec<Chart>,
    pub forecast: Option<ForecastView>,
}

/// The last `limit` rows of the table with their indicator columns.
pub fn history_rows(table: &FeatureTable, limit: usize) -> Vec<HistoryRow> {
    let start = table.len().saturating_sub(limit);
    table.bars()[start..]
        .iter()
        .zip(&table.sma[start..])
        .zip(&table.change[start..])
        .map(|((b, sma), change)| HistoryRow {
            date: b.date,
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
            adj_close: b.adj_close,
            volume: b.volume,
            sma: *sma,
            change: *change,
        })
        .collect()
}

// ── Headings ──────────────────────────────────────────────────────────────────

pub fn heading_history(profile: &CompanyProfile, start: NaiveDate) -> String {
    format!("{}: prices since {} ({})", profile.name, start, currency(profile))
}

pub fn heading_sma(profile: &CompanyProfile, window: usize) -> String {
    format!("{}: close and {}-day average ({})", profile.name, window, currency(profile))
}

pub fn heading_change(profile: &CompanyProfile) -> String {
    format!("{}: daily price movement (%)", profile.name)
}

pub fn heading_candles(profile: &CompanyProfile) -> String {
    format!("{}: candlestick", profile.name)
}

pub fn heading_forecast(profile: &CompanyProfile) -> String {
    format!("{}: forecast one month ahead ({})", profile.name, currency(profile))
}

fn currency(profile: &CompanyProfile) -> &str {
    profile.currency.as_deref().unwrap_or("USD")
}

// ── HTML ──────────────────────────────────────────────────────────────────────

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Full HTML document for one page load, successful or not.
pub fn render_page(request: &PageRequest, outcome: &Result<Report, AppError>) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{css}</style>\n</head>\n<body>\n<h1>{title}</h1>\n\
         <p class=\"disclaimer\">{disclaimer}</p>\n",
        title = TITLE,
        css = CSS,
        disclaimer = DISCLAIMER,
    );

    let _ = write!(
        html,
        "<h2>Enter a ticker symbol</h2>\n<form method=\"get\">\n\
         <label>e.g. AAPL, MSFT, SFTBY (case-insensitive) \
         <input type=\"text\" name=\"ticker\" value=\"{ticker}\"></label>\n\
         <button type=\"submit\" name=\"predict\" value=\"1\">Forecast</button>\n</form>\n\
         <p><a href=\"{url}\">{url}</a><br>See the link above for a list of ticker symbols.</p>\n",
        ticker = escape_html(&request.ticker),
        url = SYMBOL_REFERENCE_URL,
    );

    match outcome {
        Ok(report) => write_report(&mut html, report),
        Err(err) => {
            let _ = writeln!(
                html,
                "<p class=\"error\">{}</p>",
                escape_html(&err.user_message())
            );
        }
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn write_report(html: &mut String, report: &Report) {
    let profile = &report.profile;

    let _ = writeln!(
        html,
        "<h2>{}</h2>",
        escape_html(&heading_history(profile, report.start_date))
    );
    if report.history.len() < report.total_rows {
        let _ = writeln!(
            html,
            "<p class=\"note\">Showing the latest {} of {} trading days.</p>",
            report.history.len(),
            report.total_rows
        );
    }
    write_history_table(html, &report.history);

    for chart in &report.charts {
        write_chart(html, chart);
    }

    match &report.forecast {
        None => {}
        Some(ForecastView::Rejected { message }) => {
            let _ = writeln!(html, "<h2>{}</h2>", escape_html(&heading_forecast(profile)));
            let _ = writeln!(html, "<p class=\"error\">{}</p>", escape_html(message));
        }
        Some(ForecastView::Ready { outcome, chart }) => {
            let _ = writeln!(html, "<h2>{}</h2>", escape_html(&heading_forecast(profile)));
            let _ = writeln!(
                html,
                "<p>Accuracy: {:.1}%</p>\n<p>Confidence: {}</p>\n\
                 <p>The orange line (Predict) is the forecast.</p>",
                outcome.accuracy_pct,
                outcome.confidence.label()
            );
            write_chart(html, chart);
        }
    }
}

fn write_history_table(html: &mut String, rows: &[HistoryRow]) {
    html.push_str(
        "<div class=\"table\"><table>\n<thead><tr><th>Date</th><th>Open</th><th>High</th>\
         <th>Low</th><th>Close</th><th>Adj Close</th><th>Volume</th><th>SMA</th>\
         <th>change</th></tr></thead>\n<tbody>\n",
    );
    for r in rows {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td>\
             <td>{:.2}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            r.date,
            r.open,
            r.high,
            r.low,
            r.close,
            r.adj_close,
            fmt_number(r.volume.round() as i64),
            fmt_opt(r.sma, 2),
            fmt_opt(r.change, 3),
        );
    }
    html.push_str("</tbody>\n</table></div>\n");
}

fn write_chart(html: &mut String, chart: &Chart) {
    let _ = writeln!(
        html,
        "<h2>{}</h2>\n<figure>{}</figure>",
        escape_html(&chart.title),
        chart.svg
    );
}

const CSS: &str = "body{font-family:sans-serif;max-width:1000px;margin:auto;padding:1em}\
.disclaimer{color:#555;font-size:.9em}.error{color:#b00020;font-weight:bold}\
.note{color:#555}.table{max-height:320px;overflow:auto}\
table{border-collapse:collapse;font-size:.85em}td,th{padding:2px 8px;text-align:right}\
tr:nth-child(even){background:#f4f4f4}figure{margin:0}";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{Confidence, ForecastPoint};

    fn profile() -> CompanyProfile {
        CompanyProfile {
            symbol: "AAPL".into(),
            name: "Apple Inc.".into(),
            currency: Some("USD".into()),
            exchange: None,
        }
    }

    fn report(forecast: Option<ForecastView>) -> Report {
        Report {
            profile: profile(),
            start_date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            total_rows: 1,
            history: vec![HistoryRow {
                date: NaiveDate::from_ymd_opt(2021, 1, 4).unwrap(),
                open: 133.52,
                high: 133.61,
                low: 126.76,
                close: 129.41,
                adj_close: 126.83,
                volume: 143_301_900.0,
                sma: None,
                change: Some(-3.078),
            }],
            charts: vec![Chart {
                title: "Apple Inc.: candlestick".into(),
                svg: "<svg></svg>".into(),
            }],
            forecast,
        }
    }

    fn request(ticker: &str) -> PageRequest {
        PageRequest {
            ticker: ticker.into(),
            predict: false,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"A&B's"</b>"#),
            "&lt;b&gt;&quot;A&amp;B&#39;s&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_error_page_keeps_chrome_and_one_error_line() {
        let err = AppError::resolve("ZZZZZZ", "HTTP 404 Not Found");
        let html = render_page(&request("zzzzzz"), &Err(err));

        assert!(html.contains(DISCLAIMER));
        assert!(html.contains("value=\"zzzzzz\""));
        assert_eq!(html.matches("class=\"error\"").count(), 1);
        assert!(html.contains("ZZZZZZ"));
        assert!(!html.contains("<svg"));
        assert!(!html.contains("<table"));
    }

    #[test]
    fn test_report_page_has_table_and_charts() {
        let html = render_page(&request("aapl"), &Ok(report(None)));
        assert!(html.contains("Apple Inc.: prices since 2021-01-01 (USD)"));
        assert!(html.contains("143,301,900"));
        assert!(html.contains("-3.078"));
        assert!(html.contains("<svg></svg>"));
        assert!(!html.contains("Accuracy"));
        assert!(!html.contains("class=\"error\""));
    }

    #[test]
    fn test_forecast_sections() {
        let outcome = ForecastOutcome {
            score: 0.8765,
            accuracy_pct: 87.7,
            confidence: Confidence::High,
            predictions: vec![ForecastPoint {
                date: NaiveDate::from_ymd_opt(2021, 1, 5).unwrap(),
                value: 130.0,
            }],
            train_rows: 8,
            test_rows: 2,
        };
        let ready = ForecastView::Ready {
            outcome,
            chart: Chart {
                title: "Actual vs predicted".into(),
                svg: "<svg id=\"p\"></svg>".into(),
            },
        };
        let html = render_page(&request("AAPL"), &Ok(report(Some(ready))));
        assert!(html.contains("Accuracy: 87.7%"));
        assert!(html.contains("Confidence: high"));
        assert!(html.contains("<svg id=\"p\"></svg>"));

        let rejected = ForecastView::Rejected {
            message: AppError::InsufficientData { have: 10, need: 40 }.user_message(),
        };
        let html = render_page(&request("AAPL"), &Ok(report(Some(rejected))));
        assert!(html.contains("Not enough price history"));
        // descriptive results stay on the page
        assert!(html.contains("<table"));
    }

    #[test]
    fn test_company_name_is_escaped() {
        let mut r = report(None);
        r.profile.name = "AT&T <Inc>".into();
        let html = render_page(&request("T"), &Ok(r));
        assert!(html.contains("AT&amp;T &lt;Inc&gt;: prices since"));
    }
}
