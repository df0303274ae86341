//! RESP encoding and incremental reply parsing
//!
//! Outbound commands are encoded in the array-of-bulk-strings form,
//! which every RESP server accepts regardless of payload content.
//! Inbound replies are parsed incrementally from a retained buffer:
//! each socket read is fed in, the parser consumes a complete reply if
//! one is present, and otherwise waits for more bytes. A connection has
//! at most one reply outstanding, so the buffer never holds more than
//! one reply plus a partial tail.

use crate::utils::error::ProtocolError;

/// A parsed server reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Status line (+OK\r\n)
    Status(String),
    /// Error line (-ERR message\r\n)
    Error(String),
    /// Integer (:1000\r\n)
    Integer(i64),
    /// Bulk string ($6\r\nfoobar\r\n)
    Bulk(Vec<u8>),
    /// Nil sentinel ($-1\r\n or *-1\r\n)
    Nil,
    /// Multi-bulk (*2\r\n...)
    Multi(Vec<Reply>),
}

impl Reply {
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Payload bytes for a bulk reply.
    pub fn as_bulk(&self) -> Option<&[u8]> {
        match self {
            Reply::Bulk(b) => Some(b),
            _ => None,
        }
    }
}

/// Command encoder with a reusable buffer.
pub struct CommandEncoder {
    buf: Vec<u8>,
}

impl CommandEncoder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Encode a command as a RESP array of bulk strings.
    pub fn encode_command(&mut self, args: &[&[u8]]) {
        self.buf.push(b'*');
        self.write_int(args.len() as i64);
        self.buf.extend_from_slice(b"\r\n");

        for arg in args {
            self.buf.push(b'$');
            self.write_int(arg.len() as i64);
            self.buf.extend_from_slice(b"\r\n");
            self.buf.extend_from_slice(arg);
            self.buf.extend_from_slice(b"\r\n");
        }
    }

    #[inline]
    fn write_int(&mut self, value: i64) {
        let mut buffer = itoa::Buffer::new();
        self.buf.extend_from_slice(buffer.format(value).as_bytes());
    }
}

/// Incremental reply parser over a retained buffer.
///
/// `feed` appends a chunk and attempts to parse one reply from the
/// buffer head. Any partition of a reply's bytes into chunks yields
/// exactly one completion.
pub struct ReplyParser {
    buf: Vec<u8>,
}

impl ReplyParser {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(4096),
        }
    }

    /// Append `chunk` and try to complete a reply.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Option<Reply>, ProtocolError> {
        self.buf.extend_from_slice(chunk);
        match parse_value(&self.buf) {
            Ok((reply, consumed)) => {
                self.buf.drain(..consumed);
                Ok(Some(reply))
            }
            Err(ParseError::Incomplete) => Ok(None),
            Err(ParseError::Malformed(e)) => Err(e),
        }
    }

    /// Drop any buffered bytes, for connection reuse across requests.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Bytes buffered but not yet parsed into a reply.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

impl Default for ReplyParser {
    fn default() -> Self {
        Self::new()
    }
}

enum ParseError {
    Incomplete,
    Malformed(ProtocolError),
}

/// Parse one reply from the head of `data`, returning it with the
/// number of bytes consumed.
fn parse_value(data: &[u8]) -> Result<(Reply, usize), ParseError> {
    if data.is_empty() {
        return Err(ParseError::Incomplete);
    }

    match data[0] {
        b'+' => parse_line(data).map(|(s, n)| (Reply::Status(s), n)),
        b'-' => parse_line(data).map(|(s, n)| (Reply::Error(s), n)),
        b':' => parse_integer(data),
        b'$' => parse_bulk(data),
        b'*' => parse_multi(data),
        other => Err(ParseError::Malformed(ProtocolError::InvalidType(other))),
    }
}

fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == b"\r\n")
}

fn parse_line(data: &[u8]) -> Result<(String, usize), ParseError> {
    let crlf = find_crlf(data).ok_or(ParseError::Incomplete)?;
    let s = String::from_utf8_lossy(&data[1..crlf]).into_owned();
    Ok((s, crlf + 2))
}

/// Parse the decimal in a `:`/`$`/`*` header line.
fn header_int(data: &[u8], what: &'static str) -> Result<(i64, usize), ParseError> {
    let crlf = find_crlf(data).ok_or(ParseError::Incomplete)?;
    let s = std::str::from_utf8(&data[1..crlf])
        .map_err(|_| ParseError::Malformed(ProtocolError::InvalidHeader(what)))?;
    let n: i64 = s
        .parse()
        .map_err(|_| ParseError::Malformed(ProtocolError::InvalidHeader(what)))?;
    Ok((n, crlf + 2))
}

fn parse_integer(data: &[u8]) -> Result<(Reply, usize), ParseError> {
    let (n, consumed) = header_int(data, "integer")?;
    Ok((Reply::Integer(n), consumed))
}

fn parse_bulk(data: &[u8]) -> Result<(Reply, usize), ParseError> {
    let (len, header) = header_int(data, "bulk length")?;

    if len < 0 {
        return Ok((Reply::Nil, header));
    }

    let len = len as usize;
    let total = header + len + 2;
    if data.len() < total {
        return Err(ParseError::Incomplete);
    }

    Ok((Reply::Bulk(data[header..header + len].to_vec()), total))
}

fn parse_multi(data: &[u8]) -> Result<(Reply, usize), ParseError> {
    let (count, header) = header_int(data, "multi-bulk count")?;

    if count < 0 {
        return Ok((Reply::Nil, header));
    }

    let mut pos = header;
    let mut elements = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (elem, consumed) = parse_value(&data[pos..])?;
        elements.push(elem);
        pos += consumed;
    }

    Ok((Reply::Multi(elements), pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_whole(data: &[u8]) -> Reply {
        let mut parser = ReplyParser::new();
        parser.feed(data).unwrap().expect("reply incomplete")
    }

    #[test]
    fn test_encode_get() {
        let mut enc = CommandEncoder::with_capacity(64);
        enc.encode_command(&[b"GET", b"string:7"]);
        assert_eq!(enc.as_bytes(), b"*2\r\n$3\r\nGET\r\n$8\r\nstring:7\r\n");
    }

    #[test]
    fn test_encode_set_with_binary_payload() {
        let mut enc = CommandEncoder::with_capacity(64);
        enc.encode_command(&[b"SET", b"string:0", b"a\r\nb\0c"]);
        assert_eq!(
            enc.as_bytes(),
            b"*3\r\n$3\r\nSET\r\n$8\r\nstring:0\r\n$6\r\na\r\nb\0c\r\n"
        );
    }

    #[test]
    fn test_encoder_clear_reuses_buffer() {
        let mut enc = CommandEncoder::with_capacity(64);
        enc.encode_command(&[b"PING"]);
        enc.clear();
        enc.encode_command(&[b"LPOP", b"list:3"]);
        assert_eq!(enc.as_bytes(), b"*2\r\n$4\r\nLPOP\r\n$6\r\nlist:3\r\n");
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_whole(b"+OK\r\n"), Reply::Status("OK".to_string()));
    }

    #[test]
    fn test_parse_error_line() {
        assert_eq!(
            parse_whole(b"-ERR unknown command\r\n"),
            Reply::Error("ERR unknown command".to_string())
        );
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_whole(b":1000\r\n"), Reply::Integer(1000));
        assert_eq!(parse_whole(b":-3\r\n"), Reply::Integer(-3));
    }

    #[test]
    fn test_parse_bulk() {
        assert_eq!(
            parse_whole(b"$6\r\nfoobar\r\n"),
            Reply::Bulk(b"foobar".to_vec())
        );
    }

    #[test]
    fn test_parse_empty_bulk() {
        assert_eq!(parse_whole(b"$0\r\n\r\n"), Reply::Bulk(Vec::new()));
    }

    #[test]
    fn test_parse_bulk_with_embedded_crlf() {
        assert_eq!(
            parse_whole(b"$7\r\nab\r\ncd\r\n"),
            Reply::Bulk(b"ab\r\ncd".to_vec())
        );
    }

    #[test]
    fn test_parse_nil_bulk() {
        assert_eq!(parse_whole(b"$-1\r\n"), Reply::Nil);
    }

    #[test]
    fn test_parse_nil_multi() {
        assert_eq!(parse_whole(b"*-1\r\n"), Reply::Nil);
    }

    #[test]
    fn test_parse_multi() {
        assert_eq!(
            parse_whole(b"*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n"),
            Reply::Multi(vec![
                Reply::Bulk(b"foo".to_vec()),
                Reply::Bulk(b"bar".to_vec()),
            ])
        );
    }

    #[test]
    fn test_parse_multi_with_nil_element() {
        assert_eq!(
            parse_whole(b"*2\r\n$-1\r\n$1\r\nx\r\n"),
            Reply::Multi(vec![Reply::Nil, Reply::Bulk(b"x".to_vec())])
        );
    }

    #[test]
    fn test_malformed_type_byte_is_fatal() {
        let mut parser = ReplyParser::new();
        assert!(parser.feed(b"@oops\r\n").is_err());
    }

    #[test]
    fn test_malformed_bulk_header_is_fatal() {
        let mut parser = ReplyParser::new();
        assert!(parser.feed(b"$abc\r\n").is_err());
    }

    // Any partition of a reply's bytes into chunks must produce exactly
    // one completion.
    fn assert_chunked(reply_bytes: &[u8], expected: &Reply) {
        // Byte at a time.
        let mut parser = ReplyParser::new();
        let mut completions = 0;
        for (idx, b) in reply_bytes.iter().enumerate() {
            if let Some(reply) = parser.feed(std::slice::from_ref(b)).unwrap() {
                assert_eq!(&reply, expected);
                assert_eq!(idx, reply_bytes.len() - 1, "completed early");
                completions += 1;
            }
        }
        assert_eq!(completions, 1);

        // Every two-chunk split.
        for split in 1..reply_bytes.len() {
            let mut parser = ReplyParser::new();
            assert_eq!(parser.feed(&reply_bytes[..split]).unwrap(), None);
            let reply = parser.feed(&reply_bytes[split..]).unwrap();
            assert_eq!(reply.as_ref(), Some(expected));
            assert_eq!(parser.pending(), 0);
        }
    }

    #[test]
    fn test_chunked_status() {
        assert_chunked(b"+OK\r\n", &Reply::Status("OK".to_string()));
    }

    #[test]
    fn test_chunked_bulk() {
        assert_chunked(b"$5\r\nhello\r\n", &Reply::Bulk(b"hello".to_vec()));
    }

    #[test]
    fn test_chunked_multi() {
        assert_chunked(
            b"*3\r\n$1\r\na\r\n$0\r\n\r\n$2\r\nbc\r\n",
            &Reply::Multi(vec![
                Reply::Bulk(b"a".to_vec()),
                Reply::Bulk(Vec::new()),
                Reply::Bulk(b"bc".to_vec()),
            ]),
        );
    }

    #[test]
    fn test_chunked_nil() {
        assert_chunked(b"$-1\r\n", &Reply::Nil);
    }

    #[test]
    fn test_reset_discards_partial_reply() {
        let mut parser = ReplyParser::new();
        assert_eq!(parser.feed(b"$10\r\npart").unwrap(), None);
        parser.reset();
        assert_eq!(
            parser.feed(b"+OK\r\n").unwrap(),
            Some(Reply::Status("OK".to_string()))
        );
    }

    #[test]
    fn test_consecutive_replies_on_reused_parser() {
        let mut parser = ReplyParser::new();
        assert_eq!(
            parser.feed(b"+OK\r\n").unwrap(),
            Some(Reply::Status("OK".to_string()))
        );
        assert_eq!(parser.feed(b":7\r\n").unwrap(), Some(Reply::Integer(7)));
    }
}
