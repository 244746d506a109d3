//! FFmpeg filter construction.
//!
//! Values placed inside a filter graph pass through two parsers: the graph
//! parser splits filters on `,` `;` `[` `]`, then the filter's option parser
//! splits options on `:`. Both strip one level of single quotes and
//! backslash escapes, so every free-form value is quoted once per level.

/// Quote a value for one parsing level.
///
/// Inside single quotes everything is literal; an embedded quote closes the
/// quoted run, is emitted escaped, and reopens it.
fn quote_level(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Escape a value for use as a filter option inside a filter graph.
pub fn escape_filter_value(value: &str) -> String {
    quote_level(&quote_level(value))
}

/// A `drawtext` filter with the options this pipeline uses.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawText {
    pub text: String,
    pub font_file: Option<String>,
    pub font_size: u32,
    pub font_color: String,
    pub x: String,
    pub y: String,
    /// Background box colour; `None` disables the box
    pub box_color: Option<String>,
    pub box_border: u32,
    /// Timeline expression, e.g. `between(t,0,20)`
    pub enable: Option<String>,
}

impl DrawText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_file: None,
            font_size: 24,
            font_color: "black".to_string(),
            x: "(w-text_w)/2".to_string(),
            y: "h-text_h-40".to_string(),
            box_color: None,
            box_border: 0,
            enable: None,
        }
    }

    /// Render as a filter description.
    pub fn to_filter(&self) -> String {
        let mut opts = vec![
            // No %{...} expansion: the text is shown exactly as given
            "expansion=none".to_string(),
            format!("text={}", escape_filter_value(&self.text)),
        ];

        if let Some(font) = &self.font_file {
            opts.push(format!("fontfile={}", escape_filter_value(font)));
        }

        opts.push(format!("fontsize={}", self.font_size));
        opts.push(format!("fontcolor={}", escape_filter_value(&self.font_color)));
        opts.push(format!("x={}", escape_filter_value(&self.x)));
        opts.push(format!("y={}", escape_filter_value(&self.y)));

        if let Some(color) = &self.box_color {
            opts.push("box=1".to_string());
            opts.push(format!("boxcolor={}", escape_filter_value(color)));
            opts.push(format!("boxborderw={}", self.box_border));
        }

        if let Some(enable) = &self.enable {
            opts.push(format!("enable={}", escape_filter_value(enable)));
        }

        format!("drawtext={}", opts.join(":"))
    }
}

/// Join single-input filters into one linear chain.
pub fn chain(filters: &[String]) -> String {
    filters.join(",")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Port of FFmpeg's `av_get_token`: reads up to an unquoted terminator,
    /// stripping one level of quotes and backslash escapes.
    pub(crate) fn av_get_token(buf: &mut &str, term: &str) -> String {
        let mut chars: Vec<char> = buf.chars().collect();
        let mut p = 0;
        while p < chars.len() && " \n\t\r".contains(chars[p]) {
            p += 1;
        }

        let mut out: Vec<char> = Vec::new();
        let mut end = 0;
        while p < chars.len() && !term.contains(chars[p]) {
            let c = chars[p];
            p += 1;
            if c == '\\' && p < chars.len() {
                out.push(chars[p]);
                p += 1;
                end = out.len();
            } else if c == '\'' {
                while p < chars.len() && chars[p] != '\'' {
                    out.push(chars[p]);
                    p += 1;
                }
                if p < chars.len() {
                    p += 1;
                    end = out.len();
                }
            } else {
                out.push(c);
            }
        }

        while out.len() > end && out.last().is_some_and(|c| " \n\t\r".contains(*c)) {
            out.pop();
        }

        let consumed: usize = chars.drain(..p).map(char::len_utf8).sum();
        *buf = &buf[consumed..];
        out.into_iter().collect()
    }

    /// Split a linear graph into `(filter name, options)` the way the graph
    /// parser does, then parse each options string into key/value pairs.
    pub(crate) fn parse_graph(graph: &str) -> Vec<(String, Vec<(String, String)>)> {
        let mut rest = graph;
        let mut filters = Vec::new();

        while !rest.is_empty() {
            let name = av_get_token(&mut rest, "=,;[");
            let mut opts = String::new();
            if rest.starts_with('=') {
                rest = &rest[1..];
                opts = av_get_token(&mut rest, "[],;");
            }
            filters.push((name, parse_options(&opts)));
            if rest.starts_with(',') || rest.starts_with(';') {
                rest = &rest[1..];
            } else {
                assert!(rest.is_empty(), "unexpected graph remainder: {rest:?}");
            }
        }

        filters
    }

    fn parse_options(opts: &str) -> Vec<(String, String)> {
        let mut rest = opts;
        let mut pairs = Vec::new();
        while !rest.is_empty() {
            let (key, after) = rest.split_once('=').expect("option without key");
            rest = after;
            let value = av_get_token(&mut rest, ":");
            pairs.push((key.to_string(), value));
            if rest.starts_with(':') {
                rest = &rest[1..];
            }
        }
        pairs
    }

    fn option<'a>(pairs: &'a [(String, String)], key: &str) -> &'a str {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or_else(|| panic!("missing option {key}"))
    }

    #[test]
    fn test_quote_level_round_trips() {
        for raw in ["plain", "a:b", "it's", "back\\slash", "x,y;[z]", "line\nbreak", "  padded  "] {
            let quoted = quote_level(raw);
            let mut buf = quoted.as_str();
            assert_eq!(av_get_token(&mut buf, ":"), raw);
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_drawtext_text_survives_both_parsers() {
        let text = "Prompt: a \"neon\" city\nat night, 100% [rain]; it's wet \\ cold";
        let filter = DrawText::new(text).to_filter();

        let parsed = parse_graph(&filter);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].0, "drawtext");
        assert_eq!(option(&parsed[0].1, "text"), text);
        assert_eq!(option(&parsed[0].1, "expansion"), "none");
    }

    #[test]
    fn test_enable_expression_is_not_split_on_commas() {
        let mut drawtext = DrawText::new("hello");
        drawtext.enable = Some("between(t,0,20)".to_string());
        drawtext.box_color = Some("white@0.8".to_string());
        drawtext.box_border = 10;

        let parsed = parse_graph(&drawtext.to_filter());
        assert_eq!(parsed.len(), 1);
        assert_eq!(option(&parsed[0].1, "enable"), "between(t,0,20)");
        assert_eq!(option(&parsed[0].1, "boxcolor"), "white@0.8");
        assert_eq!(option(&parsed[0].1, "boxborderw"), "10");
        assert_eq!(option(&parsed[0].1, "x"), "(w-text_w)/2");
    }

    #[test]
    fn test_font_path_with_drive_letter() {
        let mut drawtext = DrawText::new("x");
        drawtext.font_file = Some("C:\\Fonts\\Google Sans.ttf".to_string());

        let parsed = parse_graph(&drawtext.to_filter());
        assert_eq!(option(&parsed[0].1, "fontfile"), "C:\\Fonts\\Google Sans.ttf");
    }

    #[test]
    fn test_injection_attempt_stays_inside_text() {
        let text = "x',drawbox=c=red:t=fill,drawtext=text='pwned";
        let graph = chain(&[DrawText::new(text).to_filter(), DrawText::new("second").to_filter()]);

        let parsed = parse_graph(&graph);
        assert_eq!(parsed.len(), 2);
        assert_eq!(option(&parsed[0].1, "text"), text);
        assert_eq!(option(&parsed[1].1, "text"), "second");
    }
}
