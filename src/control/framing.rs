//! Line reassembly for the command transport.
//!
//! TCP reads do not respect line boundaries: a read can end in the middle
//! of a line and the rest arrives with the next read. [`LineAssembler`]
//! keeps the unterminated tail between reads.
//!
//! Lines end with `\n`; a trailing `\r` is stripped. Bytes are buffered
//! rather than decoded per read so a multi-byte character split across two
//! reads survives intact.
//!
//! A line that outgrows [`MAX_LINE_LENGTH`] is dropped whole: the buffered
//! part is discarded at once and the rest is skipped up to its terminator.

/// Maximum unterminated line length before the buffer is discarded.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

#[derive(Debug, Default)]
pub struct LineAssembler {
    /// Bytes after the last terminator seen.
    carry: Vec<u8>,
    /// Set while skipping the remainder of an oversized line.
    discarding: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one read and return every line it completes.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.carry.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.carry[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            if self.discarding {
                // Tail of an oversized line.
                self.discarding = false;
            } else {
                let line = &self.carry[start..end];
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                lines.push(String::from_utf8_lossy(line).into_owned());
            }
            start = end + 1;
        }
        self.carry.drain(..start);

        if self.carry.len() > MAX_LINE_LENGTH {
            tracing::warn!(
                "Discarding {} bytes without a line terminator (max {})",
                self.carry.len(),
                MAX_LINE_LENGTH
            );
            self.carry.clear();
            self.discarding = true;
        }

        lines
    }

    /// Bytes waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.carry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fragment_carried_across_reads() {
        let mut assembler = LineAssembler::new();

        assert_eq!(assembler.push(b"C1|ok\r\nC2|"), vec!["C1|ok"]);
        assert_eq!(assembler.pending(), 3);
        assert_eq!(assembler.push(b"more\r\n"), vec!["C2|more"]);
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn test_several_lines_in_one_read() {
        let mut assembler = LineAssembler::new();
        let lines = assembler.push(b"V1.4.0.0\nH1234ABCD\nM10000001|Client connected\n");
        assert_eq!(lines, vec!["V1.4.0.0", "H1234ABCD", "M10000001|Client connected"]);
    }

    #[test]
    fn test_empty_lines_are_returned_as_empty() {
        let mut assembler = LineAssembler::new();
        assert_eq!(assembler.push(b"\n\r\nX\n"), vec!["", "", "X"]);
    }

    #[test]
    fn test_crlf_split_between_reads() {
        let mut assembler = LineAssembler::new();
        assert!(assembler.push(b"S0|x=1\r").is_empty());
        assert_eq!(assembler.push(b"\n"), vec!["S0|x=1"]);
    }

    #[test]
    fn test_multibyte_character_split_between_reads() {
        let mut assembler = LineAssembler::new();
        let text = "M1|caf\u{e9}\n".as_bytes();
        let split = text.len() - 2;

        assert!(assembler.push(&text[..split]).is_empty());
        assert_eq!(assembler.push(&text[split..]), vec!["M1|caf\u{e9}"]);
    }

    #[test]
    fn test_oversized_fragment_discarded() {
        let mut assembler = LineAssembler::new();
        let junk = vec![b'x'; MAX_LINE_LENGTH + 1];

        assert!(assembler.push(&junk).is_empty());
        assert_eq!(assembler.pending(), 0);
        assert_eq!(assembler.push(b"still junk\nok\n"), vec!["ok"]);
    }

    #[test]
    fn test_oversized_line_tail_not_forwarded() {
        let mut assembler = LineAssembler::new();
        let mut head = b"S1|".to_vec();
        head.extend(vec![b'x'; MAX_LINE_LENGTH + 1]);

        assert!(assembler.push(&head).is_empty());
        assert_eq!(
            assembler.push(b" display pan 0xBAD center=9.0\nR2|0|\n"),
            vec!["R2|0|"]
        );
        assert_eq!(assembler.push(b"R3|0|\n"), vec!["R3|0|"]);
    }

    #[test]
    fn test_oversized_line_skipped_across_several_reads() {
        let mut assembler = LineAssembler::new();
        assembler.push(&vec![b'x'; MAX_LINE_LENGTH + 1]);

        assert!(assembler.push(b"more of the same line").is_empty());
        assert!(assembler.push(b" and more\r").is_empty());
        assert_eq!(assembler.push(b"\nM1|next\n"), vec!["M1|next"]);
    }
}
