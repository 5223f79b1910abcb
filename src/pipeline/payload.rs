//! Prompt payload: image records as a compact, line-oriented tag block.
//!
//! ```text
//! <image id="page_2_1" page="2" x0="72.00" y0="90.50" x1="300.00" y1="260.25" file="out/page_2_1.png" caption="Figure 3: Cross-section" />
//! ```
//!
//! One line per record, in input order, attributes in a fixed order.
//! Output is a pure function of the records.

use crate::record::ImageRecord;
use std::fmt::Write as _;

/// Serialize `records`, one `<image ... />` line each, `\n`-separated.
///
/// Returns an empty string for an empty slice.
pub fn build(records: &[ImageRecord]) -> String {
    let mut out = String::new();
    for record in records {
        if !out.is_empty() {
            out.push('\n');
        }
        write_line(&mut out, record);
    }
    out
}

fn write_line(out: &mut String, record: &ImageRecord) {
    let b = &record.bounding_box;
    // Writing into a String cannot fail.
    let _ = write!(
        out,
        r#"<image id="{}" page="{}" x0="{:.2}" y0="{:.2}" x1="{:.2}" y1="{:.2}" file="{}""#,
        record.id,
        record.page_number,
        b.x0,
        b.y0,
        b.x1,
        b.y1,
        escape_attr(&record.file_path.to_string_lossy()),
    );

    if let Some(caption) = &record.caption {
        let _ = write!(out, r#" caption="{}""#, escape_attr(caption));
    } else if let Some(nearby) = &record.nearby_text {
        let _ = write!(out, r#" nearby_text="{}""#, escape_attr(nearby));
    }

    out.push_str(" />");
}

/// Escape a value for use inside a double-quoted attribute.
pub fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            c if c.is_control() => {
                let _ = write!(escaped, "&#x{:X};", c as u32);
            }
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{BoundingBox, ImageId};
    use std::path::PathBuf;

    fn record(page: usize, seq: usize, caption: Option<&str>, nearby: Option<&str>) -> ImageRecord {
        ImageRecord {
            id: ImageId::new(page, seq).unwrap(),
            page_number: page,
            bounding_box: BoundingBox::new(72.0, 90.5, 300.0, 260.25).unwrap(),
            file_path: PathBuf::from(format!("out/page_{page}_{seq}.png")),
            caption: caption.map(Into::into),
            nearby_text: nearby.map(Into::into),
        }
    }

    #[test]
    fn empty_input_is_empty_string() {
        assert_eq!(build(&[]), "");
    }

    #[test]
    fn single_record_with_caption() {
        let line = build(&[record(2, 1, Some("Figure 3: Cross-section"), None)]);
        assert_eq!(
            line,
            r#"<image id="page_2_1" page="2" x0="72.00" y0="90.50" x1="300.00" y1="260.25" file="out/page_2_1.png" caption="Figure 3: Cross-section" />"#
        );
    }

    #[test]
    fn nearby_text_used_without_caption() {
        let line = build(&[record(1, 1, None, Some("The cell wall"))]);
        assert!(line.ends_with(r#"nearby_text="The cell wall" />"#), "got {line}");
        assert!(!line.contains("caption="));
    }

    #[test]
    fn no_context_attribute_when_neither_set() {
        let line = build(&[record(1, 1, None, None)]);
        assert!(line.ends_with(r#"file="out/page_1_1.png" />"#), "got {line}");
    }

    #[test]
    fn one_line_per_record_in_input_order() {
        let out = build(&[record(1, 1, None, None), record(1, 2, None, None), record(3, 1, None, None)]);
        let ids: Vec<&str> = out
            .lines()
            .map(|l| l.split('"').nth(1).unwrap())
            .collect();
        assert_eq!(ids, vec!["page_1_1", "page_1_2", "page_3_1"]);
        assert!(!out.ends_with('\n'));
    }

    #[test]
    fn attribute_values_are_escaped() {
        let line = build(&[record(1, 1, Some("Fig. 1: \"A\" & <B>\nit's"), None)]);
        assert!(
            line.contains(r#"caption="Fig. 1: &quot;A&quot; &amp; &lt;B&gt;&#xA;it&apos;s""#),
            "got {line}"
        );
        assert_eq!(line.lines().count(), 1);
    }

    #[test]
    fn deterministic() {
        let records = vec![record(1, 1, Some("Figure 1: x"), None), record(2, 1, None, Some("y"))];
        assert_eq!(build(&records), build(&records));
    }
}
