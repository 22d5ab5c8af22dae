//! CSV export of the pair listing

use vidpair_core::{PairDocument, VideoRecord};

const VIDEO_COLUMNS: [&str; 7] = [
    "file_name",
    "file_size",
    "duration",
    "fps",
    "resolution",
    "codec",
    "edited",
];

/// Render pairs as CSV: a header row, then one row per pair, CRLF-terminated.
pub fn export_csv(documents: &[PairDocument]) -> Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    let mut header = vec!["id".to_string(), "rev".to_string()];
    for side in ["a", "b"] {
        header.extend(VIDEO_COLUMNS.iter().map(|c| format!("{}_{}", side, c)));
    }
    header.push("attachments".to_string());
    writer.write_record(&header)?;

    for doc in documents {
        let mut row = vec![
            doc.id.clone().unwrap_or_default(),
            doc.rev.clone().unwrap_or_default(),
        ];
        row.extend(video_fields(&doc.video_a));
        row.extend(video_fields(&doc.video_b));
        row.push(
            doc.attachments
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(";"),
        );
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| csv::Error::from(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

fn video_fields(video: &VideoRecord) -> Vec<String> {
    vec![
        video.file_name.clone(),
        video.file_size.to_string(),
        video.duration.to_string(),
        video.fps.to_string(),
        video.resolution.clone(),
        video.codec.clone(),
        video.is_edited.to_string(),
    ]
}
