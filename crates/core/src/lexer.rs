use crate::error::ScriptError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifiers and keywords; the parser tells them apart
    Word(String),
    /// Capitalized identifier
    Const(String),
    /// `@name`, sigil included
    IVar(String),
    /// `@@name`, sigil included
    CVar(String),
    /// `$name`, sigil included
    GVar(String),
    /// `name:` as used for keyword arguments and hash keys
    Label(String),
    /// `:name` or `:"name"` (content without the colon)
    Symbol(String),
    /// String literal (escapes resolved, interpolations kept as source)
    Str(Vec<StrPart>),
    /// Backtick command string
    XStr(Vec<StrPart>),
    /// `%w[]` / `%i[]` word lists
    Words { symbols: bool, items: Vec<String> },
    /// Regex literal, body kept verbatim
    Regex { source: String, flags: String },
    Int(i64),
    /// Integer too large for `i64`, kept as written without underscores
    BigInt(String),
    Float(f64),
    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    SafeNav,    // &.
    ColonColon, // ::
    Arrow,      // =>
    Lambda,     // ->
    /// Operators, including assignment forms (`=`, `+=`, `||=`), `?` and `:`
    Op(String),
    Newline,
    Semi,
    // End of input
    Eof,
}

/// One piece of a string literal.
#[derive(Debug, Clone, PartialEq)]
pub enum StrPart {
    Lit(String),
    /// Source text of a `#{...}` interpolation and the line it starts on
    Interp { source: String, line: u32 },
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
    /// Whether whitespace (or start of input) precedes the token. Ruby uses
    /// this to tell `foo [1]` (argument) from `foo[1]` (index).
    pub space_before: bool,
}

/// Words that never end an expression, so a following `/`, `:` or `%`
/// starts a literal rather than an operator.
const NON_VALUE_WORDS: &[&str] = &[
    "if", "unless", "while", "until", "and", "or", "not", "return", "when", "elsif", "then", "do",
    "case", "in", "else", "begin", "yield", "next", "break",
];

// Operators ordered longest first so the first match wins.
const OPERATORS: &[&str] = &[
    "**=", "<=>", "===", "...", "<<=", ">>=", "&&=", "||=", "**", "==", "!=", ">=", "<=", "&&",
    "||", "<<", ">>", "=~", "!~", "..", "+=", "-=", "*=", "/=", "%=", "|=", "&=", "^=", "=>",
    "->", "::", "&.", "+", "-", "*", "/", "%", "=", "<", ">", "!", "&", "|", "^", "~", "?", ":",
];

struct PendingHeredoc {
    token_index: usize,
    id: String,
    indented_end: bool,
    squiggly: bool,
    raw: bool,
    line: u32,
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    filename: &'a str,
    tokens: Vec<Spanned>,
    heredocs: Vec<PendingHeredoc>,
}

pub fn lex(src: &str, filename: &str) -> Result<Vec<Spanned>, ScriptError> {
    lex_from(src, filename, 1)
}

/// Lex `src` as if it started on `first_line` of `filename`. Used for
/// string interpolations, whose source is lexed separately.
pub fn lex_from(src: &str, filename: &str, first_line: u32) -> Result<Vec<Spanned>, ScriptError> {
    let mut lexer = Lexer {
        chars: src.chars().collect(),
        pos: 0,
        line: first_line,
        filename,
        tokens: Vec::new(),
        heredocs: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl<'a> Lexer<'a> {
    fn err(&self, line: u32, msg: impl Into<String>) -> ScriptError {
        ScriptError::syntax(self.filename, line, msg)
    }

    fn at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn at_line_start(&self) -> bool {
        self.pos == 0 || self.chars[self.pos - 1] == '\n'
    }

    fn starts_with(&self, s: &str) -> bool {
        let mut i = self.pos;
        for c in s.chars() {
            if self.chars.get(i) != Some(&c) {
                return false;
            }
            i += 1;
        }
        true
    }

    fn push(&mut self, token: Token, line: u32, start: usize) {
        let space_before = start == 0 || self.chars[start - 1].is_whitespace();
        self.tokens.push(Spanned {
            token,
            line,
            space_before,
        });
    }

    /// True when the previous token ends a value, so `/`, `%`, `:` and `<<`
    /// continue a binary expression.
    fn prev_is_value(&self) -> bool {
        match self.tokens.last().map(|s| &s.token) {
            Some(Token::Word(w)) => !NON_VALUE_WORDS.contains(&w.as_str()),
            Some(
                Token::Const(_)
                | Token::IVar(_)
                | Token::CVar(_)
                | Token::GVar(_)
                | Token::Symbol(_)
                | Token::Str(_)
                | Token::XStr(_)
                | Token::Words { .. }
                | Token::Regex { .. }
                | Token::Int(_)
                | Token::BigInt(_)
                | Token::Float(_)
                | Token::RParen
                | Token::RBracket
                | Token::RBrace,
            ) => true,
            _ => false,
        }
    }

    /// `foo /x/`, `puts %w[a]`: a bare identifier followed by a space and a
    /// literal opener with no space after it is a command argument.
    fn looks_like_command_arg(&self, opener_len: usize) -> bool {
        let space_before = self.pos > 0 && self.chars[self.pos - 1].is_whitespace();
        let next = self.at(opener_len);
        let prev_is_ident = matches!(
            self.tokens.last().map(|s| &s.token),
            Some(Token::Word(w)) if !NON_VALUE_WORDS.contains(&w.as_str())
        );
        prev_is_ident
            && space_before
            && next.map_or(false, |c| !c.is_whitespace() && c != '=')
    }

    fn literal_allowed(&self, opener_len: usize) -> bool {
        !self.prev_is_value() || self.looks_like_command_arg(opener_len)
    }

    fn run(&mut self) -> Result<(), ScriptError> {
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];

            if self.at_line_start() {
                if self.starts_with("=begin") {
                    self.skip_block_comment()?;
                    continue;
                }
                if self.starts_with("__END__")
                    && matches!(self.at(7), None | Some('\n') | Some('\r'))
                {
                    break;
                }
            }

            // Line comment
            if c == '#' {
                while self.pos < self.chars.len() && self.chars[self.pos] != '\n' {
                    self.pos += 1;
                }
                continue;
            }

            // Line continuation
            if c == '\\' && self.at(1) == Some('\n') {
                self.pos += 2;
                self.line += 1;
                continue;
            }

            if c == '\n' {
                let line = self.line;
                if !matches!(
                    self.tokens.last().map(|s| &s.token),
                    None | Some(Token::Newline)
                ) {
                    self.push(Token::Newline, line, self.pos);
                }
                self.pos += 1;
                self.line += 1;
                if !self.heredocs.is_empty() {
                    self.read_heredoc_bodies()?;
                }
                continue;
            }

            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }

            let start = self.pos;
            let line = self.line;

            match c {
                '"' => {
                    self.pos += 1;
                    let parts = self.scan_quoted('"', true)?;
                    self.push(Token::Str(parts), line, start);
                    continue;
                }
                '\'' => {
                    self.pos += 1;
                    let parts = self.scan_quoted('\'', false)?;
                    self.push(Token::Str(parts), line, start);
                    continue;
                }
                '`' => {
                    self.pos += 1;
                    let parts = self.scan_quoted('`', true)?;
                    self.push(Token::XStr(parts), line, start);
                    continue;
                }
                _ => {}
            }

            if c.is_ascii_digit() {
                let token = self.scan_number()?;
                self.push(token, line, start);
                continue;
            }

            if c == '@' {
                let sigil = if self.at(1) == Some('@') { 2 } else { 1 };
                self.pos += sigil;
                let name = self.scan_ident_chars();
                if name.is_empty() {
                    return Err(self.err(line, "expected name after '@'"));
                }
                let text: String = self.chars[start..self.pos].iter().collect();
                let token = if sigil == 2 {
                    Token::CVar(text)
                } else {
                    Token::IVar(text)
                };
                self.push(token, line, start);
                continue;
            }

            if c == '$' {
                self.pos += 1;
                let name = self.scan_ident_chars();
                if name.is_empty() {
                    // Special globals such as `$?` and `$0`
                    match self.at(0) {
                        Some(p) if !p.is_whitespace() => self.pos += 1,
                        _ => return Err(self.err(line, "expected name after '$'")),
                    }
                }
                let text: String = self.chars[start..self.pos].iter().collect();
                self.push(Token::GVar(text), line, start);
                continue;
            }

            if c.is_alphabetic() || c == '_' {
                let token = self.scan_word();
                self.push(token, line, start);
                continue;
            }

            if c == ':' {
                if let Some(token) = self.scan_symbol()? {
                    self.push(token, line, start);
                    continue;
                }
            }

            if c == '%' && self.literal_allowed(1) {
                if let Some(token) = self.scan_percent_literal(line)? {
                    self.push(token, line, start);
                    continue;
                }
            }

            if c == '/' && self.literal_allowed(1) {
                self.pos += 1;
                let token = self.scan_regex(line)?;
                self.push(token, line, start);
                continue;
            }

            if c == '<' && self.at(1) == Some('<') && self.literal_allowed(2) {
                if let Some(token) = self.scan_heredoc_start(line) {
                    self.push(token, line, start);
                    continue;
                }
            }

            let punct = match c {
                '(' => Some(Token::LParen),
                ')' => Some(Token::RParen),
                '[' => Some(Token::LBracket),
                ']' => Some(Token::RBracket),
                '{' => Some(Token::LBrace),
                '}' => Some(Token::RBrace),
                ',' => Some(Token::Comma),
                ';' => Some(Token::Semi),
                '.' if self.at(1) != Some('.') => Some(Token::Dot),
                _ => None,
            };
            if let Some(token) = punct {
                self.pos += 1;
                self.push(token, line, start);
                continue;
            }

            if let Some(op) = OPERATORS.iter().find(|op| self.starts_with(op)) {
                self.pos += op.chars().count();
                let token = match *op {
                    "=>" => Token::Arrow,
                    "->" => Token::Lambda,
                    "::" => Token::ColonColon,
                    "&." => Token::SafeNav,
                    other => Token::Op(other.to_owned()),
                };
                self.push(token, line, start);
                continue;
            }

            return Err(self.err(line, format!("unexpected character '{}'", c)));
        }

        if let Some(pending) = self.heredocs.first() {
            return Err(self.err(
                pending.line,
                format!("unterminated heredoc '{}'", pending.id),
            ));
        }

        let line = self.line;
        self.tokens.push(Spanned {
            token: Token::Eof,
            line,
            space_before: true,
        });
        Ok(())
    }

    fn skip_block_comment(&mut self) -> Result<(), ScriptError> {
        let line = self.line;
        loop {
            // skip to the start of the next line
            while self.pos < self.chars.len() && self.chars[self.pos] != '\n' {
                self.pos += 1;
            }
            if self.pos >= self.chars.len() {
                return Err(self.err(line, "unterminated =begin comment"));
            }
            self.pos += 1;
            self.line += 1;
            if self.starts_with("=end") {
                while self.pos < self.chars.len() && self.chars[self.pos] != '\n' {
                    self.pos += 1;
                }
                return Ok(());
            }
        }
    }

    fn scan_ident_chars(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.chars.len()
            && (self.chars[self.pos].is_alphanumeric() || self.chars[self.pos] == '_')
        {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn scan_word(&mut self) -> Token {
        let mut word = self.scan_ident_chars();
        // predicate / bang suffix, but not `!=` or `?=`-style operators
        if let Some(suffix @ ('?' | '!')) = self.at(0) {
            if self.at(1) != Some('=') || self.at(2) == Some('=') {
                word.push(suffix);
                self.pos += 1;
            }
        }
        // `key:` label, but not `Foo::Bar` or a ternary `a ? b : c`
        let after_dot = matches!(
            self.tokens.last().map(|s| &s.token),
            Some(Token::Dot | Token::SafeNav)
        );
        if !after_dot && self.at(0) == Some(':') && self.at(1) != Some(':') {
            let ends_word = !word.ends_with('?');
            if ends_word {
                self.pos += 1;
                return Token::Label(word);
            }
        }
        if word.starts_with(|c: char| c.is_uppercase()) {
            Token::Const(word)
        } else {
            Token::Word(word)
        }
    }

    fn scan_number(&mut self) -> Result<Token, ScriptError> {
        let line = self.line;
        let start = self.pos;
        let radix = match (self.at(0), self.at(1)) {
            (Some('0'), Some('x' | 'X')) => Some((16, 2)),
            (Some('0'), Some('b' | 'B')) => Some((2, 2)),
            (Some('0'), Some('o' | 'O')) => Some((8, 2)),
            (Some('0'), Some('d' | 'D')) => Some((10, 2)),
            (Some('0'), Some('0'..='7' | '_')) => Some((8, 1)),
            _ => None,
        };
        if let Some((radix, prefix)) = radix {
            self.pos += prefix;
            let digits_start = self.pos;
            while self
                .at(0)
                .map_or(false, |c| c.is_digit(radix) || c == '_')
            {
                self.pos += 1;
            }
            let digits: String = self.chars[digits_start..self.pos]
                .iter()
                .filter(|c| **c != '_')
                .collect();
            let text: String = self.chars[start..self.pos]
                .iter()
                .filter(|c| **c != '_')
                .collect();
            if digits.is_empty() {
                return Err(self.err(line, format!("invalid numeric literal '{}'", text)));
            }
            return Ok(match i64::from_str_radix(&digits, radix) {
                Ok(n) => Token::Int(n),
                Err(_) => Token::BigInt(text),
            });
        }
        while self.at(0).map_or(false, |c| c.is_ascii_digit() || c == '_') {
            self.pos += 1;
        }
        let mut is_float = false;
        if self.at(0) == Some('.') && self.at(1).map_or(false, |c| c.is_ascii_digit()) {
            is_float = true;
            self.pos += 1;
            while self.at(0).map_or(false, |c| c.is_ascii_digit() || c == '_') {
                self.pos += 1;
            }
        }
        if matches!(self.at(0), Some('e' | 'E'))
            && (self.at(1).map_or(false, |c| c.is_ascii_digit())
                || (matches!(self.at(1), Some('+' | '-'))
                    && self.at(2).map_or(false, |c| c.is_ascii_digit())))
        {
            is_float = true;
            self.pos += 2;
            while self.at(0).map_or(false, |c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        if is_float {
            return text
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| self.err(line, format!("invalid float '{}'", text)));
        }
        // Only digits are left, so parsing fails on overflow alone.
        Ok(match text.parse::<i64>() {
            Ok(n) => Token::Int(n),
            Err(_) => Token::BigInt(text),
        })
    }

    /// `:name`, `:"quoted"`, or `::`. Returns `None` for a bare `:` so the
    /// caller lexes it as an operator.
    fn scan_symbol(&mut self) -> Result<Option<Token>, ScriptError> {
        if self.at(1) == Some(':') {
            return Ok(None);
        }
        let symbol_position = !self.prev_is_value()
            || (self.pos > 0 && self.chars[self.pos - 1].is_whitespace()
                && self.tokens.last().map_or(false, |s| {
                    !matches!(s.token, Token::Op(ref o) if o == "?")
                }));
        if !symbol_position {
            return Ok(None);
        }
        match self.at(1) {
            Some('"') => {
                self.pos += 2;
                let parts = self.scan_quoted('"', true)?;
                let text = parts
                    .into_iter()
                    .map(|p| match p {
                        StrPart::Lit(s) => s,
                        StrPart::Interp { source, .. } => format!("#{{{}}}", source),
                    })
                    .collect();
                Ok(Some(Token::Symbol(text)))
            }
            Some(c) if c.is_alphabetic() || c == '_' => {
                self.pos += 1;
                let mut name = self.scan_ident_chars();
                if let Some(suffix @ ('?' | '!' | '=')) = self.at(0) {
                    if self.at(1) != Some('=') && self.at(1) != Some('>') {
                        name.push(suffix);
                        self.pos += 1;
                    }
                }
                Ok(Some(Token::Symbol(name)))
            }
            Some('[') if self.at(2) == Some(']') => {
                self.pos += 3;
                Ok(Some(Token::Symbol("[]".to_owned())))
            }
            _ => Ok(None),
        }
    }

    /// Scan a quoted body up to `close`; the opening delimiter has already
    /// been consumed.
    fn scan_quoted(&mut self, close: char, interpolate: bool) -> Result<Vec<StrPart>, ScriptError> {
        let line = self.line;
        let (parts, consumed, newlines) =
            scan_string_body(&self.chars[self.pos..], Some(close), interpolate, line)
                .map_err(|msg| self.err(line, msg))?;
        self.pos += consumed;
        self.line += newlines;
        Ok(parts)
    }

    fn scan_percent_literal(&mut self, line: u32) -> Result<Option<Token>, ScriptError> {
        let (kind, open_offset) = match self.at(1) {
            Some(k @ ('w' | 'W' | 'i' | 'I' | 'q' | 'Q')) => (k, 2),
            Some('(' | '[' | '{' | '<' | '|' | '!') => ('Q', 1),
            _ => return Ok(None),
        };
        let open = match self.at(open_offset) {
            Some(o @ ('(' | '[' | '{' | '<' | '|' | '!' | '/')) => o,
            _ => return Ok(None),
        };
        let close = match open {
            '(' => ')',
            '[' => ']',
            '{' => '}',
            '<' => '>',
            other => other,
        };
        self.pos += open_offset + 1;
        match kind {
            'w' | 'W' | 'i' | 'I' => {
                let start = self.pos;
                while self.at(0).map_or(false, |c| c != close) {
                    if self.at(0) == Some('\n') {
                        self.line += 1;
                    }
                    self.pos += 1;
                }
                if self.at(0).is_none() {
                    return Err(self.err(line, "unterminated word list"));
                }
                let body: String = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                let items = body.split_whitespace().map(str::to_owned).collect();
                Ok(Some(Token::Words {
                    symbols: matches!(kind, 'i' | 'I'),
                    items,
                }))
            }
            _ => {
                let parts = self.scan_quoted(close, kind == 'Q')?;
                Ok(Some(Token::Str(parts)))
            }
        }
    }

    fn scan_regex(&mut self, line: u32) -> Result<Token, ScriptError> {
        let start = self.pos;
        loop {
            match self.at(0) {
                None | Some('\n') => return Err(self.err(line, "unterminated regex literal")),
                Some('\\') => self.pos += 2,
                Some('/') => break,
                Some(_) => self.pos += 1,
            }
        }
        let source: String = self.chars[start..self.pos].iter().collect();
        self.pos += 1;
        let flags_start = self.pos;
        while matches!(self.at(0), Some('i' | 'm' | 'x' | 'o')) {
            self.pos += 1;
        }
        let flags = self.chars[flags_start..self.pos].iter().collect();
        Ok(Token::Regex { source, flags })
    }

    /// `<<~ID`, `<<-ID`, `<<ID` (uppercase) and quoted forms. The body is
    /// read at the next newline; a placeholder token is pushed now.
    fn scan_heredoc_start(&mut self, line: u32) -> Option<Token> {
        let mut offset = 2;
        let (squiggly, dash) = match self.at(offset) {
            Some('~') => (true, false),
            Some('-') => (false, true),
            _ => (false, false),
        };
        if squiggly || dash {
            offset += 1;
        }
        let quote = match self.at(offset) {
            Some(q @ ('\'' | '"' | '`')) => {
                offset += 1;
                Some(q)
            }
            _ => None,
        };
        let id_start = self.pos + offset;
        let mut end = id_start;
        while self
            .chars
            .get(end)
            .map_or(false, |c| c.is_alphanumeric() || *c == '_')
        {
            end += 1;
        }
        if end == id_start {
            return None;
        }
        let id: String = self.chars[id_start..end].iter().collect();
        if quote.is_none() && !(squiggly || dash) && !id.starts_with(|c: char| c.is_uppercase()) {
            return None;
        }
        if let Some(q) = quote {
            if self.chars.get(end) != Some(&q) {
                return None;
            }
            end += 1;
        }
        self.pos = end;
        self.heredocs.push(PendingHeredoc {
            token_index: self.tokens.len(),
            id,
            indented_end: squiggly || dash,
            squiggly,
            raw: quote == Some('\''),
            line,
        });
        Some(Token::Str(Vec::new()))
    }

    fn read_heredoc_bodies(&mut self) -> Result<(), ScriptError> {
        let pending = std::mem::take(&mut self.heredocs);
        for doc in pending {
            let body_line = self.line;
            let mut lines: Vec<String> = Vec::new();
            loop {
                if self.pos >= self.chars.len() {
                    return Err(self.err(doc.line, format!("unterminated heredoc '{}'", doc.id)));
                }
                let start = self.pos;
                while self.pos < self.chars.len() && self.chars[self.pos] != '\n' {
                    self.pos += 1;
                }
                let text: String = self.chars[start..self.pos].iter().collect();
                let text = text.trim_end_matches('\r').to_owned();
                if self.pos < self.chars.len() {
                    self.pos += 1;
                }
                self.line += 1;
                let is_end = if doc.indented_end {
                    text.trim() == doc.id
                } else {
                    text == doc.id
                };
                if is_end {
                    break;
                }
                lines.push(text);
            }
            if doc.squiggly {
                dedent(&mut lines);
            }
            let mut body = String::new();
            for l in &lines {
                body.push_str(l);
                body.push('\n');
            }
            let parts = if doc.raw {
                vec![StrPart::Lit(body)]
            } else {
                let chars: Vec<char> = body.chars().collect();
                scan_string_body(&chars, None, true, body_line)
                    .map(|(parts, _, _)| parts)
                    .map_err(|msg| self.err(body_line, msg))?
            };
            if let Some(slot) = self.tokens.get_mut(doc.token_index) {
                slot.token = Token::Str(parts);
            }
        }
        Ok(())
    }
}

/// Remove the common leading whitespace of all non-blank lines.
fn dedent(lines: &mut [String]) {
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.chars().take_while(|c| *c == ' ' || *c == '\t').count())
        .min()
        .unwrap_or(0);
    for l in lines.iter_mut() {
        *l = l.chars().skip(indent.min(l.chars().count())).collect();
    }
}

/// Scan a string body. With `close == None` the whole slice is consumed.
/// Returns the parts, the number of chars consumed (closing delimiter
/// included) and the number of newlines crossed.
fn scan_string_body(
    chars: &[char],
    close: Option<char>,
    interpolate: bool,
    line: u32,
) -> Result<(Vec<StrPart>, usize, u32), String> {
    let mut parts = Vec::new();
    let mut lit = String::new();
    let mut pos = 0usize;
    let mut newlines = 0u32;
    loop {
        let c = match chars.get(pos) {
            Some(c) => *c,
            None => {
                if close.is_some() {
                    return Err("unterminated string literal".to_owned());
                }
                break;
            }
        };
        if Some(c) == close {
            pos += 1;
            break;
        }
        if c == '\n' {
            newlines += 1;
        }
        if c == '\\' {
            let next = match chars.get(pos + 1) {
                Some(n) => *n,
                None => return Err("unterminated escape in string".to_owned()),
            };
            if next == '\n' {
                newlines += 1;
            }
            if !interpolate {
                if next == '\\' || Some(next) == close {
                    lit.push(next);
                } else {
                    lit.push('\\');
                    lit.push(next);
                }
                pos += 2;
            } else {
                let (decoded, len) = decode_escape(&chars[pos + 1..])?;
                lit.extend(decoded);
                pos += 1 + len;
            }
            continue;
        }
        if interpolate && c == '#' && chars.get(pos + 1) == Some(&'{') {
            if !lit.is_empty() {
                parts.push(StrPart::Lit(std::mem::take(&mut lit)));
            }
            let start = pos + 2;
            let end = matching_brace(chars, start)
                .ok_or_else(|| "unterminated string interpolation".to_owned())?;
            let source: String = chars[start..end].iter().collect();
            let interp_line = line + newlines;
            newlines += source.matches('\n').count() as u32;
            parts.push(StrPart::Interp {
                source,
                line: interp_line,
            });
            pos = end + 1;
            continue;
        }
        lit.push(c);
        pos += 1;
    }
    if !lit.is_empty() || parts.is_empty() {
        parts.push(StrPart::Lit(lit));
    }
    Ok((parts, pos, newlines))
}

/// Decode the escape sequence after a backslash in a double-quoted body.
/// Returns the decoded chars (none for an escaped newline) and the number
/// of chars consumed after the backslash.
fn decode_escape(chars: &[char]) -> Result<(Vec<char>, usize), String> {
    let next = match chars.first() {
        Some(c) => *c,
        None => return Err("unterminated escape in string".to_owned()),
    };
    let simple = match next {
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        'e' => Some('\u{1b}'),
        's' => Some(' '),
        'a' => Some('\u{07}'),
        'b' => Some('\u{08}'),
        'v' => Some('\u{0b}'),
        'f' => Some('\u{0c}'),
        '\n' => return Ok((Vec::new(), 1)),
        _ => None,
    };
    if let Some(c) = simple {
        return Ok((vec![c], 1));
    }
    let hex_run = |from: usize, max: usize| {
        chars[from..]
            .iter()
            .take(max)
            .take_while(|c| c.is_ascii_hexdigit())
            .count()
    };
    let code_point = |digits: &[char], radix: u32| {
        let text: String = digits.iter().collect();
        u32::from_str_radix(&text, radix)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| format!("invalid escape '\\{}'", text))
    };
    match next {
        '0'..='7' => {
            let len = chars
                .iter()
                .take(3)
                .take_while(|c| matches!(c, '0'..='7'))
                .count();
            Ok((vec![code_point(&chars[..len], 8)?], len))
        }
        'x' => {
            let len = hex_run(1, 2);
            if len == 0 {
                return Err("invalid hex escape".to_owned());
            }
            Ok((vec![code_point(&chars[1..1 + len], 16)?], 1 + len))
        }
        'u' if chars.get(1) == Some(&'{') => {
            // `\u{1F680}` or `\u{63 61 66}`
            let mut decoded = Vec::new();
            let mut pos = 2;
            loop {
                while chars.get(pos) == Some(&' ') {
                    pos += 1;
                }
                if chars.get(pos) == Some(&'}') && !decoded.is_empty() {
                    return Ok((decoded, pos + 1));
                }
                let len = hex_run(pos, 6);
                if len == 0 {
                    return Err("invalid unicode escape".to_owned());
                }
                decoded.push(code_point(&chars[pos..pos + len], 16)?);
                pos += len;
            }
        }
        'u' => {
            if hex_run(1, 4) != 4 {
                return Err("invalid unicode escape".to_owned());
            }
            Ok((vec![code_point(&chars[1..5], 16)?], 5))
        }
        other => Ok((vec![other], 1)),
    }
}

/// Index of the `}` closing an interpolation that starts at `start`,
/// skipping braces inside nested string literals.
fn matching_brace(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut pos = start;
    while let Some(&c) = chars.get(pos) {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(pos),
            '}' => depth -= 1,
            '"' | '\'' => {
                pos += 1;
                while let Some(&q) = chars.get(pos) {
                    if q == '\\' {
                        pos += 1;
                    } else if q == c {
                        break;
                    }
                    pos += 1;
                }
            }
            _ => {}
        }
        pos += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        lex(src, "Fastfile")
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    fn lit(s: &str) -> Token {
        Token::Str(vec![StrPart::Lit(s.to_owned())])
    }

    #[test]
    fn lexes_lane_header() {
        assert_eq!(
            tokens("lane :beta do |options|\nend"),
            vec![
                Token::Word("lane".into()),
                Token::Symbol("beta".into()),
                Token::Word("do".into()),
                Token::Op("|".into()),
                Token::Word("options".into()),
                Token::Op("|".into()),
                Token::Newline,
                Token::Word("end".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn labels_and_rocket_keys() {
        assert_eq!(
            tokens("gym(scheme: \"Example\", :force => true)"),
            vec![
                Token::Word("gym".into()),
                Token::LParen,
                Token::Label("scheme".into()),
                lit("Example"),
                Token::Comma,
                Token::Symbol("force".into()),
                Token::Arrow,
                Token::Word("true".into()),
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn ternary_colon_is_an_operator() {
        let toks = tokens("a ? b : c");
        assert_eq!(toks[1], Token::Op("?".into()));
        assert_eq!(toks[3], Token::Op(":".into()));
    }

    #[test]
    fn numbers_with_underscores_and_floats() {
        assert_eq!(
            tokens("1_000 25.12 0x1f"),
            vec![Token::Int(1000), Token::Float(25.12), Token::Int(31), Token::Eof]
        );
    }

    #[test]
    fn radix_prefixes_and_leading_zero_octal() {
        assert_eq!(
            tokens("0b101 0o17 0755 0d19 0"),
            vec![
                Token::Int(5),
                Token::Int(15),
                Token::Int(493),
                Token::Int(19),
                Token::Int(0),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn integers_beyond_i64_keep_their_digits() {
        assert_eq!(
            tokens("20240101123456789012 0xffff_ffff_ffff_ffff_ff"),
            vec![
                Token::BigInt("20240101123456789012".into()),
                Token::BigInt("0xffffffffffffffffff".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn empty_radix_literal_is_syntax_error() {
        let err = lex("x = 0x\n", "Fastfile").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { .. }), "{:?}", err);
    }

    #[test]
    fn unicode_and_hex_escapes_decode() {
        assert_eq!(
            tokens("slack(message: \"caf\\u00e9 \\u{1F680}\")")[3],
            lit("caf\u{e9} \u{1F680}")
        );
        assert_eq!(tokens("\"\\u{63 61 66}\"")[0], lit("caf"));
        assert_eq!(tokens("\"\\x41\\x7a\"")[0], lit("Az"));
    }

    #[test]
    fn control_and_octal_escapes_decode() {
        assert_eq!(
            tokens("\"\\a\\b\\v\\f\\e\\s\"")[0],
            lit("\u{07}\u{08}\u{0b}\u{0c}\u{1b} ")
        );
        assert_eq!(tokens("\"\\101\\0\\7\"")[0], lit("A\u{0}\u{7}"));
    }

    #[test]
    fn single_quotes_keep_unknown_escapes() {
        assert_eq!(tokens("'a\\u00e9 \\' \\\\'")[0], lit("a\\u00e9 ' \\"));
    }

    #[test]
    fn malformed_unicode_escape_is_syntax_error() {
        let err = lex("puts \"\\u12\"\n", "Fastfile").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { .. }), "{:?}", err);
    }

    #[test]
    fn comments_and_blank_lines_collapse_to_one_newline() {
        assert_eq!(
            tokens("foo # trailing\n\n# full line\n\nbar"),
            vec![
                Token::Word("foo".into()),
                Token::Newline,
                Token::Word("bar".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn interpolation_keeps_source() {
        assert_eq!(
            tokens("\"v#{version + 1}!\""),
            vec![
                Token::Str(vec![
                    StrPart::Lit("v".into()),
                    StrPart::Interp {
                        source: "version + 1".into(),
                        line: 1
                    },
                    StrPart::Lit("!".into()),
                ]),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn single_quotes_do_not_interpolate() {
        assert_eq!(tokens("'a#{b}\\n'"), vec![lit("a#{b}\\n"), Token::Eof]);
    }

    #[test]
    fn squiggly_heredoc_is_dedented() {
        let src = "desc <<~TEXT\n    first\n      second\n  TEXT\nfoo";
        let toks = tokens(src);
        assert_eq!(toks[1], lit("first\n  second\n"));
        assert_eq!(toks[2], Token::Newline);
        assert_eq!(toks[3], Token::Word("foo".into()));
    }

    #[test]
    fn heredoc_line_numbers_continue_after_body() {
        let spanned = lex("x = <<-EOS\n  a\n  EOS\nfoo", "Fastfile").unwrap();
        let foo = spanned
            .iter()
            .find(|s| s.token == Token::Word("foo".into()))
            .unwrap();
        assert_eq!(foo.line, 4);
    }

    #[test]
    fn shift_operator_is_not_a_heredoc() {
        let toks = tokens("list << Item");
        assert_eq!(toks[1], Token::Op("<<".into()));
    }

    #[test]
    fn regex_versus_division() {
        assert_eq!(
            tokens("a / b")[1],
            Token::Op("/".into()),
            "binary division between values"
        );
        assert_eq!(
            tokens("x =~ /beta-\\d+/i")[2],
            Token::Regex {
                source: "beta-\\d+".into(),
                flags: "i".into()
            }
        );
    }

    #[test]
    fn word_lists() {
        assert_eq!(
            tokens("%w[a b c]")[0],
            Token::Words {
                symbols: false,
                items: vec!["a".into(), "b".into(), "c".into()]
            }
        );
    }

    #[test]
    fn block_comment_and_end_marker() {
        assert_eq!(
            tokens("=begin\nignored\n=end\nfoo\n__END__\nbar baz"),
            vec![Token::Word("foo".into()), Token::Newline, Token::Eof]
        );
    }

    #[test]
    fn predicate_method_names() {
        assert_eq!(
            tokens("is_ci? != x")[0..2],
            [Token::Word("is_ci?".into()), Token::Op("!=".into())]
        );
    }

    #[test]
    fn unterminated_string_is_syntax_error() {
        let err = lex("puts \"oops\n", "Fastfile").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { line: 1, .. }), "{:?}", err);
    }

    #[test]
    fn unterminated_heredoc_is_syntax_error() {
        let err = lex("desc <<~EOS\nnever closed\n", "Fastfile").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { .. }));
    }
}
