//! Output plumbing for the renderer.
//!
//! [`Formatter`] is a [`std::fmt::Write`] façade over either a [`String`] or
//! an arbitrary [`std::io::Write`] sink. The [`Writer`] adapter smuggles the
//! underlying [`io::Error`] out of the `fmt` layer so the renderer can
//! report the real sink failure.

use std::fmt;
use std::io;

/// A `fmt::Write` façade over the render output.
pub(crate) struct Formatter<'a> {
    buf: &'a mut (dyn fmt::Write + 'a),
}

impl<'a> Formatter<'a> {
    pub fn with_string(buf: &'a mut String) -> Self {
        Self { buf }
    }

    pub fn with_writer<W>(buf: &'a mut Writer<W>) -> Self
    where
        W: io::Write,
    {
        Self { buf }
    }
}

impl fmt::Write for Formatter<'_> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buf.write_str(s)
    }

    #[inline]
    fn write_char(&mut self, c: char) -> fmt::Result {
        self.buf.write_char(c)
    }

    #[inline]
    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> fmt::Result {
        self.buf.write_fmt(args)
    }
}

pub(crate) struct Writer<W> {
    writer: W,
    err: Option<io::Error>,
}

impl<W> Writer<W>
where
    W: io::Write,
{
    pub fn new(writer: W) -> Self {
        Self { writer, err: None }
    }

    pub fn take_err(&mut self) -> Option<io::Error> {
        self.err.take()
    }
}

impl<W> fmt::Write for Writer<W>
where
    W: io::Write,
{
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.writer.write_all(s.as_bytes()).map_err(|e| {
            self.err = Some(e);
            fmt::Error
        })
    }

    #[inline]
    fn write_char(&mut self, c: char) -> fmt::Result {
        self.writer
            .write_all(c.encode_utf8(&mut [0; 4]).as_bytes())
            .map_err(|e| {
                self.err = Some(e);
                fmt::Error
            })
    }
}

/// Writes `s` with the five HTML special characters entity-escaped.
///
/// Used for `tal:content`/`tal:replace` text output and for every attribute
/// value. The replacement set matches the escaping the templates themselves
/// are expected to contain, so re-escaping an attribute value is a fixed
/// point.
pub(crate) fn escape<W: fmt::Write + ?Sized>(f: &mut W, s: &str) -> fmt::Result {
    let mut last = 0;
    for (i, b) in s.bytes().enumerate() {
        let entity = match b {
            b'&' => "&amp;",
            b'\'' => "&#39;",
            b'<' => "&lt;",
            b'>' => "&gt;",
            b'"' => "&#34;",
            _ => continue,
        };
        f.write_str(&s[last..i])?;
        f.write_str(entity)?;
        last = i + 1;
    }
    f.write_str(&s[last..])
}
