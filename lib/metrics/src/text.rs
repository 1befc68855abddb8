use std::fmt::Write;

use crate::attributes::Attributes;
use crate::registry::Reporter;

/// Renders reported metrics in the Prometheus text exposition format.
#[derive(Default)]
pub struct TextEncoder {
    current: Option<&'static str>,
    buf: String,
}

impl TextEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

impl Reporter for TextEncoder {
    fn start_metric(&mut self, name: &'static str, description: &'static str) {
        let _ = writeln!(self.buf, "# HELP {} {}", name, escape_help(description));
        let _ = writeln!(self.buf, "# TYPE {} counter", name);
        self.current = Some(name);
    }

    fn report(&mut self, attrs: &Attributes, value: u64) {
        let Some(name) = self.current else {
            return;
        };

        self.buf.push_str(name);
        if !attrs.is_empty() {
            self.buf.push('{');
            for (index, (key, value)) in attrs.iter().enumerate() {
                if index != 0 {
                    self.buf.push(',');
                }
                let _ = write!(self.buf, "{}=\"{}\"", key, escape_label_value(value));
            }
            self.buf.push('}');
        }
        let _ = writeln!(self.buf, " {}", value);
    }

    fn finish_metric(&mut self) {
        self.current = None;
    }
}

fn escape_help(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::Registry;

    #[test]
    fn encode() {
        let reg = Registry::new();
        let requests = reg.register_counter("http_requests_total", "Number of http requests.");
        requests
            .recorder([
                ("code", Cow::Borrowed("200")),
                ("api_url", Cow::Borrowed("http://localhost:8080")),
            ])
            .inc(3);
        requests
            .recorder([
                ("code", Cow::Borrowed("500")),
                ("api_url", Cow::Borrowed("http://localhost:8080")),
            ])
            .inc(1);
        reg.register_counter("started_total", "Started.")
            .recorder(&[])
            .inc(1);

        let mut encoder = TextEncoder::new();
        reg.report(&mut encoder);

        assert_eq!(
            encoder.finish(),
            "# HELP http_requests_total Number of http requests.\n\
             # TYPE http_requests_total counter\n\
             http_requests_total{api_url=\"http://localhost:8080\",code=\"200\"} 3\n\
             http_requests_total{api_url=\"http://localhost:8080\",code=\"500\"} 1\n\
             # HELP started_total Started.\n\
             # TYPE started_total counter\n\
             started_total 1\n"
        );
    }

    #[test]
    fn escape() {
        assert_eq!(escape_label_value("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
        assert_eq!(escape_help("line\nbreak"), "line\\nbreak");
    }
}
