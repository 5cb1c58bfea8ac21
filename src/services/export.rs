use crate::domain::{BusinessRecord, NOT_AVAILABLE};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub const CSV_HEADER: [&str; 9] = [
    "Business Name",
    "Email ID",
    "Phone Number",
    "Location / Address",
    "Business Category",
    "Website URL",
    "Social Media Profiles",
    "Rating",
    "Reviews",
];

/// Renders records as UTF-8 CSV with a byte-order mark so spreadsheet tools
/// pick the right encoding.
pub fn to_csv(records: &[BusinessRecord]) -> Result<Vec<u8>, csv::Error> {
    let mut buffer = UTF8_BOM.to_vec();
    {
        let mut writer = csv::Writer::from_writer(&mut buffer);
        writer.write_record(CSV_HEADER)?;
        for record in records {
            writer.write_record(csv_row(record))?;
        }
        writer.flush()?;
    }
    Ok(buffer)
}

pub fn csv_row(record: &BusinessRecord) -> [String; 9] {
    let emails = match record.emails.is_empty() {
        true => NOT_AVAILABLE.to_string(),
        false => record.emails.join(", "),
    };
    let social = match record.social_profiles.is_empty() {
        true => NOT_AVAILABLE.to_string(),
        false => record
            .social_profiles
            .iter()
            .map(|link| format!("{}: {}", link.platform.label(), link.url))
            .collect::<Vec<_>>()
            .join(" | "),
    };

    [
        or_not_available(&record.name),
        emails,
        or_not_available(&record.phone),
        or_not_available(&record.address),
        or_not_available(&record.category),
        or_not_available(&record.website),
        social,
        or_not_available(&record.rating),
        or_not_available(&record.review_count),
    ]
}

fn or_not_available(value: &str) -> String {
    match value.trim().is_empty() {
        true => NOT_AVAILABLE.to_string(),
        false => value.to_string(),
    }
}
