use std::collections::HashSet;

use crate::read;
use nu_ansi_term::{Color, Style};
use reedline::Highlighter;
use reedline::StyledText;

pub struct Lisp {
    funcs: HashSet<&'static str>,
}

impl Highlighter for Lisp {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let func_color = Color::LightRed;
        let fn_color = Color::LightMagenta;
        let neutral_color = Color::Purple;
        let num_color = Color::Cyan;
        let str_color = Color::LightGreen;
        let bool_color = Color::Blue;
        let nil_color = Color::LightBlue;
        let path_color = Color::Yellow;
        let paren_colors = [
            Color::Rgb(255, 198, 124),
            Color::Rgb(228, 124, 255),
            Color::LightBlue,
        ];
        let comment_color = Color::DarkGray;

        let mut styled_text = StyledText::new();
        let Ok(mut tokens) = read::tokenize_with_whitespace(line) else {
            styled_text.push((Style::new(), line.to_owned()));
            return styled_text;
        };

        let mut paren_depth: i32 = 0;

        while let Some(token) = tokens.next() {
            let trimmed = token.trim();

            let style = match trimmed {
                "(" => Style::from(paren_colors[paren_depth.unsigned_abs() as usize % 3]),
                ")" => Style::from(paren_colors[(paren_depth + 2).unsigned_abs() as usize % 3]),

                string if string.starts_with('"') => Style::from(str_color),
                num if num.parse::<i64>().is_ok() => Style::from(num_color),
                "true" | "false" => Style::from(bool_color),
                "nil" => Style::from(nil_color).bold(),
                comment if comment.starts_with(';') => Style::from(comment_color).bold(),
                path if path.contains("::") => Style::from(path_color).bold(),
                kw if self.funcs.contains(kw) => Style::from(func_color).bold(),

                // non-keyword functions
                _ if matches!(tokens.prev().map(str::trim), Some("(")) => Style::from(fn_color),
                // other data
                _ => Style::from(neutral_color),
            };

            styled_text.push((style, token.to_string()));

            match trimmed {
                "(" => paren_depth += 1,
                ")" => paren_depth -= 1,
                _ => {}
            }
        }

        styled_text
    }
}

impl Lisp {
    /// Construct the default highlighter with a given set of extern commands/keywords to detect and highlight
    pub fn new(external_commands: Vec<&'static str>) -> Self {
        Self {
            funcs: HashSet::from_iter(external_commands),
        }
    }
}
