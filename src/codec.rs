//! Line format shared by the plan and progress logs.
//!
//! Every operation occupies one line: its variant tag, a space, then its
//! constructor fields wrapped in double quotes and separated by single
//! spaces:
//!
//! ```text
//! RenameInFile "a.cue" "Artist A" "Artist B"
//! RenameFile "a.cue" "b.cue"
//! ```
//!
//! There is no escape mechanism. Fields are split on the quote character,
//! so a field may contain neither `"` nor a line terminator; [`check_field`]
//! rejects such values before they reach a log.

use crate::error::{JournalError, Result};
use crate::model::{Op, Operation, OperationKind, RenameFile, RenameInFile};

pub const QUOTE: char = '"';

/// Ensure a field value survives a write/read cycle.
pub fn check_field(field: &str) -> Result<()> {
    let reason = if field.contains(QUOTE) {
        "contains a double quote"
    } else if field.contains(['\n', '\r']) {
        "contains a line terminator"
    } else {
        return Ok(());
    };
    Err(JournalError::Unencodable {
        field: field.to_string(),
        reason: reason.to_string(),
    })
}

/// Quote and join fields: `"a" "b" "c"`.
pub fn quote_fields(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| format!("{QUOTE}{f}{QUOTE}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split quoted field data into exactly `arity` fields.
///
/// `n` fields split into `2n + 1` pieces on the quote character. Odd pieces
/// are the values; the leading piece must be empty, inner separators must be
/// a single space and the trailing piece may only hold whitespace.
pub fn split_fields(data: &str, arity: usize) -> Result<Vec<String>> {
    let pieces: Vec<&str> = data.split(QUOTE).collect();
    if pieces.len() != 2 * arity + 1 {
        return Err(JournalError::parse(
            data,
            format!("expected {arity} quoted fields"),
        ));
    }

    let last = pieces.len() - 1;
    for (i, sep) in pieces.iter().enumerate().step_by(2) {
        let ok = match i {
            0 => sep.is_empty(),
            i if i == last => sep.trim().is_empty(),
            _ => *sep == " ",
        };
        if !ok {
            return Err(JournalError::parse(
                data,
                format!("unexpected text {sep:?} between fields"),
            ));
        }
    }

    Ok(pieces
        .iter()
        .skip(1)
        .step_by(2)
        .map(|f| f.to_string())
        .collect())
}

/// Encode an operation as a log line, without the trailing newline.
pub fn encode_line(op: &Op) -> String {
    format!("{} {}", op.tag(), op.serialize())
}

/// Decode one log line back into an operation.
pub fn decode_line(line: &str) -> Result<Op> {
    let line = line.trim_end_matches(['\n', '\r']);
    let (tag, data) = line
        .split_once(' ')
        .ok_or_else(|| JournalError::parse(line, "missing operation tag"))?;

    match tag {
        RenameFile::TAG => Ok(Op::RenameFile(RenameFile::deserialize(data)?)),
        RenameInFile::TAG => Ok(Op::RenameInFile(RenameInFile::deserialize(data)?)),
        other => Err(JournalError::parse(
            line,
            format!("unknown operation tag {other:?}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_rename_file_line() {
        let op = Op::from(RenameFile::new("/tmp/a.flac", "/tmp/b.flac"));
        assert_eq!(encode_line(&op), r#"RenameFile "/tmp/a.flac" "/tmp/b.flac""#);
    }

    #[test]
    fn legacy_rename_in_file_line() {
        let op = Op::from(RenameInFile::new("a.cue", "is is a", "at was some"));
        assert_eq!(
            encode_line(&op),
            r#"RenameInFile "a.cue" "is is a" "at was some""#
        );
    }

    #[test]
    fn decode_accepts_trailing_newline() {
        let op = decode_line("RenameFile \"a\" \"b\"\n").unwrap();
        assert_eq!(op, Op::from(RenameFile::new("a", "b")));
    }

    #[test]
    fn round_trip_keeps_spaces_and_empty_fields() {
        let ops = [
            Op::from(RenameFile::new("dir with space/01 - Intro.flac", "x y")),
            Op::from(RenameInFile::new("a b.cue", "", "  ")),
            Op::from(RenameInFile::new("ünïcödé.log", "Artist A", "Artiste B")),
        ];
        for op in ops {
            assert_eq!(decode_line(&encode_line(&op)).unwrap(), op);
        }
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        let err = decode_line(r#"DeleteFile "a""#).unwrap_err();
        assert!(err.to_string().contains("unknown operation tag"));
    }

    #[test]
    fn decode_rejects_wrong_arity() {
        assert!(decode_line(r#"RenameFile "a""#).is_err());
        assert!(decode_line(r#"RenameInFile "a" "b""#).is_err());
        assert!(decode_line("RenameFile").is_err());
    }

    #[test]
    fn split_rejects_garbage_between_fields() {
        assert!(split_fields(r#""a"x"b""#, 2).is_err());
        assert!(split_fields(r#"x"a" "b""#, 2).is_err());
        assert!(split_fields(r#""a"  "b""#, 2).is_err());
    }

    #[test]
    fn check_field_rejects_quotes_and_newlines() {
        assert!(check_field("plain name.flac").is_ok());
        assert!(check_field("say \"hi\"").is_err());
        assert!(check_field("two\nlines").is_err());
        assert!(check_field("cr\r").is_err());
    }
}
