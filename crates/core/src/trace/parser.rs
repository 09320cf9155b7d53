//! Allocation-light parser for the line-oriented trace wire format:
//!
//! ```text
//! <type> <addr> [<src_addr>] <size> [<file>:<line>] [T<tid>]
//! ```

use crate::common::error::ParseError;
use crate::trace::event::TraceEvent;

/// Parses one logical trace line.
///
/// Returns `Ok(None)` for a blank line or a `#`-prefixed comment. Returns
/// `Err` for a malformed event line; the caller (the trace processor) is
/// expected to log and skip it rather than abort the run.
pub fn parse_line(line: &str) -> Result<Option<TraceEvent>, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let mut tokens = trimmed.split_whitespace();
    let type_token = tokens.next().ok_or(ParseError::Skippable)?;
    let mut chars = type_token.chars();
    let kind = chars.next().ok_or(ParseError::Skippable)?;
    let hint_digit = chars.next().and_then(|c| c.to_digit(10));

    let mut event = TraceEvent::default();
    let expects_source = matches!(kind, 'M' | 'O');

    match kind {
        'L' | 'l' | 'R' | 'r' => {}
        'S' | 's' => event.is_write = true,
        'I' | 'i' => event.is_icache = true,
        'P' => {
            event.is_prefetch = true;
            event.prefetch_hint = hint_digit.unwrap_or(0).min(3) as u8;
        }
        'V' => event.is_vector = true,
        'U' => {
            event.is_vector = true;
            event.is_write = true;
        }
        'A' => event.is_atomic = true,
        'X' => {
            event.is_atomic = true;
            event.is_rmw = true;
            event.is_write = true;
        }
        'C' => {
            event.is_atomic = true;
            event.is_cmpxchg = true;
            event.is_write = true;
        }
        'Z' => {
            event.is_memset = true;
            event.is_write = true;
        }
        'M' => event.is_memcpy = true,
        'O' => event.is_memmove = true,
        other => return Err(ParseError::UnknownEventType(other)),
    }

    let addr_token = tokens.next().ok_or(ParseError::InvalidAddress)?;
    event.address = parse_hex(addr_token).ok_or(ParseError::InvalidAddress)?;

    if expects_source {
        let src_token = tokens.next().ok_or(ParseError::MissingSourceAddress)?;
        event.src_address = Some(parse_hex(src_token).ok_or(ParseError::MissingSourceAddress)?);
    }

    let size_token = tokens.next().ok_or(ParseError::InvalidSize)?;
    let size: u32 = size_token.parse().map_err(|_| ParseError::InvalidSize)?;
    if size == 0 {
        return Err(ParseError::InvalidSize);
    }
    event.size = size;

    for token in tokens {
        if let Some(rest) = token.strip_prefix('T') {
            // A trace file whose own name starts with 'T' (e.g. "Thread.cpp:9")
            // is ambiguous with the thread-id field; it is reinterpreted as
            // the thread field, even if the numeric parse below fails and
            // the location is lost.
            if let Ok(tid) = rest.parse::<u32>() {
                event.thread_id = tid;
            }
            continue;
        }
        if let Some((file, line_str)) = token.rsplit_once(':') {
            if let Ok(line_no) = line_str.parse::<u32>() {
                event.file = file.to_string();
                event.line = line_no;
            }
        }
    }

    Ok(Some(event))
}

fn parse_hex(token: &str) -> Option<u64> {
    let digits = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")).unwrap_or(token);
    u64::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# a comment").unwrap(), None);
    }

    #[test]
    fn plain_load_parses_address_and_size() {
        let event = parse_line("L 0x1000 8").unwrap().unwrap();
        assert_eq!(event.address, 0x1000);
        assert_eq!(event.size, 8);
        assert!(!event.is_write);
        assert_eq!(event.thread_id, 1);
    }

    #[test]
    fn store_sets_is_write() {
        let event = parse_line("S 0x2000 4").unwrap().unwrap();
        assert!(event.is_write);
    }

    #[test]
    fn bare_hex_without_0x_prefix_parses() {
        let event = parse_line("L 1000 4").unwrap().unwrap();
        assert_eq!(event.address, 0x1000);
    }

    #[test]
    fn file_and_line_and_thread_parse_in_any_trailing_order() {
        let event = parse_line("S 0x3000 4 a.c:42 T7").unwrap().unwrap();
        assert_eq!(event.file, "a.c");
        assert_eq!(event.line, 42);
        assert_eq!(event.thread_id, 7);
    }

    #[test]
    fn prefetch_hint_digit_is_captured() {
        let event = parse_line("P2 0x4000 64").unwrap().unwrap();
        assert!(event.is_prefetch);
        assert_eq!(event.prefetch_hint, 2);
    }

    #[test]
    fn memcpy_requires_source_address() {
        let err = parse_line("M 0x5000 8").unwrap_err();
        assert_eq!(err, ParseError::MissingSourceAddress);
        let event = parse_line("M 0x5000 0x6000 8").unwrap().unwrap();
        assert_eq!(event.address, 0x5000);
        assert_eq!(event.src_address, Some(0x6000));
        assert!(event.is_memcpy);
    }

    #[test]
    fn memmove_also_requires_source_address() {
        let event = parse_line("O 0x5000 0x6000 32").unwrap().unwrap();
        assert!(event.is_memmove);
        assert_eq!(event.src_address, Some(0x6000));
    }

    #[test]
    fn memset_is_write_only() {
        let event = parse_line("Z 0x7000 256").unwrap().unwrap();
        assert!(event.is_memset);
        assert!(event.is_write);
    }

    #[test]
    fn atomic_rmw_and_cmpxchg_are_writes() {
        let rmw = parse_line("X 0x8000 8").unwrap().unwrap();
        assert!(rmw.is_atomic && rmw.is_rmw && rmw.is_write);
        let cas = parse_line("C 0x8000 8").unwrap().unwrap();
        assert!(cas.is_atomic && cas.is_cmpxchg && cas.is_write);
        let load = parse_line("A 0x8000 8").unwrap().unwrap();
        assert!(load.is_atomic && !load.is_write);
    }

    #[test]
    fn unknown_type_letter_is_an_error() {
        let err = parse_line("Q 0x1000 8").unwrap_err();
        assert_eq!(err, ParseError::UnknownEventType('Q'));
    }

    #[test]
    fn zero_size_is_rejected() {
        let err = parse_line("L 0x1000 0").unwrap_err();
        assert_eq!(err, ParseError::InvalidSize);
    }

    #[test]
    fn missing_address_is_an_error() {
        let err = parse_line("L").unwrap_err();
        assert_eq!(err, ParseError::InvalidAddress);
    }

    #[test]
    fn vector_store_sets_both_vector_and_write() {
        let event = parse_line("U 0x9000 32").unwrap().unwrap();
        assert!(event.is_vector && event.is_write);
    }
}
