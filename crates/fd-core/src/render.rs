//! Plain-text rendering of chat replies, record tables and fleet summaries.

use std::fmt::Write as FmtWrite;

use fd_protocol::{ChatMessage, FleetRecord, LooseNumber, QueryResult};

use crate::engine::FleetSummary;
use crate::style::{pad, truncate, Style};

const MAX_CELL: usize = 28;
const HEADERS: [&str; 7] = ["ID", "VEHICLE", "CATEGORY", "STATUS", "LOCATION", "RATE/DAY", "MILEAGE"];

/// Reply text followed by a table of any records it carried.
pub fn render_message(message: &ChatMessage, style: &Style) -> String {
    let mut out = message.content.clone();
    if let Some(records) = &message.records {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        if records.is_empty() {
            out.push_str(&style.dim("(no matching vehicles)"));
        } else {
            out.push_str(&render_table(records, style));
        }
    }
    out
}

pub fn render_table(records: &[FleetRecord], style: &Style) -> String {
    let rows: Vec<[String; 7]> = records.iter().map(|r| cells(r, style)).collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(crate::style::visible_width(cell));
        }
    }

    let mut out = String::new();
    let header: Vec<String> = HEADERS
        .iter()
        .zip(widths)
        .map(|(h, w)| pad(&style.bold(h), w))
        .collect();
    let _ = writeln!(out, "{}", header.join("  ").trim_end());
    for row in &rows {
        let line: Vec<String> = row.iter().zip(widths).map(|(c, w)| pad(c, w)).collect();
        let _ = writeln!(out, "{}", line.join("  ").trim_end());
    }
    out.truncate(out.trim_end().len());
    out
}

/// A results page with a footer such as `page 2/5, 93 vehicles`.
pub fn render_page(result: &QueryResult, page_index: usize, style: &Style) -> String {
    if result.total_count == 0 {
        return style.dim("No vehicles match.");
    }
    let noun = if result.total_count == 1 { "vehicle" } else { "vehicles" };
    let footer = format!(
        "page {}/{}, {} {noun}",
        page_index + 1,
        result.page_count,
        result.total_count
    );
    if result.page.is_empty() {
        return style.dim(&footer);
    }
    format!("{}\n{}", render_table(&result.page, style), style.dim(&footer))
}

pub fn render_summary(summary: &FleetSummary, style: &Style) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", style.bold("Vehicles:"), summary.total);
    if let Some(location) = summary.location.as_deref().filter(|l| !l.is_empty()) {
        let _ = writeln!(out, "{} {location}", style.bold("Location:"));
    }
    let _ = writeln!(
        out,
        "{} {} available, {} rented, {} in maintenance",
        style.bold("Status:"),
        summary.available,
        summary.rented,
        summary.maintenance
    );
    if !summary.categories.is_empty() {
        let categories: Vec<String> = summary
            .categories
            .iter()
            .map(|(name, count)| format!("{name} {count}"))
            .collect();
        let _ = writeln!(out, "{} {}", style.bold("Categories:"), categories.join(", "));
    }
    if let Some(rate) = summary.average_daily_rate {
        let _ = writeln!(out, "{} ${rate:.2}", style.bold("Average rate:"));
    }
    out.truncate(out.trim_end().len());
    out
}

fn cells(record: &FleetRecord, style: &Style) -> [String; 7] {
    let year = record.year.as_ref().map(LooseNumber::to_string).unwrap_or_default();
    let vehicle = [record.make.as_str(), record.model.as_str(), year.as_str()]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    [
        truncate(&record.vehicle_id, MAX_CELL),
        truncate(&vehicle, MAX_CELL),
        truncate(&record.category, MAX_CELL),
        style.status(record.status),
        truncate(&record.location, MAX_CELL),
        record.daily_rate.as_ref().map(format_rate).unwrap_or_default(),
        record.mileage.as_ref().map(format_mileage).unwrap_or_default(),
    ]
}

/// `54.2` as `$54.20`; text that is not a number is shown as given.
pub fn format_rate(rate: &LooseNumber) -> String {
    match rate.as_f64() {
        Some(value) => format!("${value:.2}"),
        None => rate.to_string(),
    }
}

/// `12000` as `12,000 mi`.
pub fn format_mileage(mileage: &LooseNumber) -> String {
    let Some(value) = mileage.as_f64() else {
        return mileage.to_string();
    };
    let digits = (value.round().abs() as u64).to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{grouped} mi")
}

#[cfg(test)]
mod tests {
    use super::*;
    use fd_protocol::VehicleStatus;
    use pretty_assertions::assert_eq;

    fn camry() -> FleetRecord {
        FleetRecord::new("T1")
            .with_vehicle("Toyota", "Camry", 2024)
            .with_category("sedan")
            .with_status(VehicleStatus::Available)
            .with_location("Los Angeles, CA", "90001")
            .with_daily_rate("54.2")
            .with_mileage(12000)
    }

    #[test]
    fn table_aligns_columns() {
        let table = render_table(&[camry(), FleetRecord::new("X")], &Style::disabled());
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID  VEHICLE"));
        assert_eq!(
            lines[1],
            "T1  Toyota Camry 2024  sedan     available  Los Angeles, CA  $54.20    12,000 mi"
        );
        assert!(lines[2].starts_with("X "));
        assert!(lines[2].ends_with('-'));
    }

    #[test]
    fn message_with_records_appends_table() {
        let message = ChatMessage::assistant_with_records("Found one:", vec![camry()]);
        let out = render_message(&message, &Style::disabled());
        assert!(out.starts_with("Found one:\n\nID"));
        assert!(out.contains("Toyota Camry 2024"));

        let empty = ChatMessage::assistant_with_records("", Vec::new());
        assert_eq!(render_message(&empty, &Style::disabled()), "(no matching vehicles)");
    }

    #[test]
    fn page_footer_counts_from_one() {
        let result = QueryResult {
            page: vec![camry()],
            total_count: 21,
            page_count: 3,
        };
        let out = render_page(&result, 1, &Style::disabled());
        assert!(out.ends_with("page 2/3, 21 vehicles"));

        let none = QueryResult {
            page_count: 1,
            ..Default::default()
        };
        assert_eq!(render_page(&none, 0, &Style::disabled()), "No vehicles match.");
    }

    #[test]
    fn summary_lists_counts() {
        let mut summary = FleetSummary {
            total: 3,
            available: 2,
            rented: 1,
            average_daily_rate: Some(61.5),
            location: Some("Seattle, WA".to_string()),
            ..Default::default()
        };
        summary.categories.insert("suv".to_string(), 3);
        let out = render_summary(&summary, &Style::disabled());
        assert_eq!(
            out,
            "Vehicles: 3\nLocation: Seattle, WA\nStatus: 2 available, 1 rented, 0 in maintenance\nCategories: suv 3\nAverage rate: $61.50"
        );
    }

    #[test]
    fn formats_rates_and_mileage() {
        assert_eq!(format_rate(&LooseNumber::from("65")), "$65.00");
        assert_eq!(format_rate(&LooseNumber::from("ask")), "ask");
        assert_eq!(format_mileage(&LooseNumber::from(1_234_567i64)), "1,234,567 mi");
        assert_eq!(format_mileage(&LooseNumber::from(999i64)), "999 mi");
    }
}
