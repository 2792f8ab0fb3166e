//! 무손실 OFX 토큰 모델.
//!
//! 문서를 태그와 텍스트 토큰의 나열로 분해합니다. 각 토큰은 원본 바이트를 그대로
//! 보관하므로 수정하지 않은 부분은 직렬화 시 입력과 정확히 같습니다.
//!
//! SGML(1.x)의 닫히지 않은 리프 `<TAG>value`와 XML(2.x)의 `<TAG>value</TAG>`를
//! 모두 같은 모델로 다룹니다. 값은 여는 태그 바로 뒤의 텍스트 토큰입니다.

use std::fmt;
use std::ops::Range;

/// 태그 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `<NAME>`
    Open,
    /// `</NAME>`
    Close,
    /// `<?...?>` 또는 `<!...>`
    Instruction,
}

/// 태그 토큰.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    kind: TagKind,
    name: String,
    raw: String,
}

impl Tag {
    fn from_raw(raw: &str) -> Self {
        let inner = raw
            .strip_prefix('<')
            .and_then(|s| s.strip_suffix('>'))
            .unwrap_or(raw);

        let (kind, name) = if inner.starts_with('?') || inner.starts_with('!') {
            (TagKind::Instruction, String::new())
        } else if let Some(rest) = inner.strip_prefix('/') {
            (TagKind::Close, rest.trim().to_ascii_uppercase())
        } else {
            let name = inner
                .split_whitespace()
                .next()
                .unwrap_or("")
                .trim_end_matches('/');
            (TagKind::Open, name.to_ascii_uppercase())
        };

        Self {
            kind,
            name,
            raw: raw.to_string(),
        }
    }

    /// 새 여는 태그.
    pub fn open(name: &str) -> Self {
        Self::from_raw(&format!("<{}>", name))
    }

    /// 새 닫는 태그.
    pub fn close(name: &str) -> Self {
        Self::from_raw(&format!("</{}>", name))
    }

    /// 태그 종류.
    pub fn kind(&self) -> TagKind {
        self.kind
    }

    /// 대문자로 정규화된 태그 이름.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 원본 표기.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// 문서 토큰.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// 태그
    Tag(Tag),
    /// 태그 사이의 텍스트 (헤더, 값, 공백)
    Text(String),
}

impl Token {
    /// 원본 표기.
    pub fn raw(&self) -> &str {
        match self {
            Token::Tag(tag) => tag.raw(),
            Token::Text(text) => text,
        }
    }
}

/// 토큰 단위로 분해된 OFX 문서.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    tokens: Vec<Token>,
}

impl Document {
    /// 텍스트를 토큰으로 분해합니다. 실패하지 않습니다.
    pub fn parse(text: &str) -> Self {
        let mut tokens = Vec::new();
        let mut text_buf = String::new();
        let mut rest = text;

        while !rest.is_empty() {
            let Some(lt) = rest.find('<') else {
                text_buf.push_str(rest);
                break;
            };

            text_buf.push_str(&rest[..lt]);
            rest = &rest[lt..];

            // '<' 다음의 가장 가까운 '>' 이전에 다른 '<'가 있으면 첫 '<'는 텍스트
            let after = &rest[1..];
            let gt = after.find('>');
            let next_lt = after.find('<');
            match (gt, next_lt) {
                (Some(g), Some(n)) if n < g => {
                    text_buf.push_str(&rest[..n + 1]);
                    rest = &rest[n + 1..];
                }
                (Some(g), _) => {
                    if !text_buf.is_empty() {
                        tokens.push(Token::Text(std::mem::take(&mut text_buf)));
                    }
                    tokens.push(Token::Tag(Tag::from_raw(&rest[..g + 2])));
                    rest = &rest[g + 2..];
                }
                (None, _) => {
                    text_buf.push_str(rest);
                    break;
                }
            }
        }

        if !text_buf.is_empty() {
            tokens.push(Token::Text(text_buf));
        }

        Self { tokens }
    }

    /// 토큰 목록.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// 토큰 수.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// 빈 문서 여부.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// 지정 위치의 태그.
    pub fn tag(&self, idx: usize) -> Option<&Tag> {
        match self.tokens.get(idx) {
            Some(Token::Tag(tag)) => Some(tag),
            _ => None,
        }
    }

    /// 지정 위치가 주어진 이름의 여는 태그인지 여부.
    pub fn is_open(&self, idx: usize, name: &str) -> bool {
        self.tag(idx)
            .map(|t| t.kind == TagKind::Open && t.name == name)
            .unwrap_or(false)
    }

    /// 지정 위치가 주어진 이름의 닫는 태그인지 여부.
    pub fn is_close(&self, idx: usize, name: &str) -> bool {
        self.tag(idx)
            .map(|t| t.kind == TagKind::Close && t.name == name)
            .unwrap_or(false)
    }

    /// 주어진 이름의 여는 태그 위치 목록.
    pub fn opens(&self, name: &str) -> Vec<usize> {
        (0..self.tokens.len())
            .filter(|&i| self.is_open(i, name))
            .collect()
    }

    /// 이름 조건을 만족하는 여는 태그 위치 목록.
    pub fn opens_where(&self, pred: impl Fn(&str) -> bool) -> Vec<usize> {
        self.tokens
            .iter()
            .enumerate()
            .filter_map(|(i, t)| match t {
                Token::Tag(tag) if tag.kind == TagKind::Open && pred(&tag.name) => Some(i),
                _ => None,
            })
            .collect()
    }

    /// 주어진 이름의 여는 태그 존재 여부.
    pub fn contains_open(&self, name: &str) -> bool {
        (0..self.tokens.len()).any(|i| self.is_open(i, name))
    }

    /// 범위 안에서 주어진 이름의 첫 여는 태그.
    pub fn find_open_in(&self, name: &str, range: Range<usize>) -> Option<usize> {
        let end = range.end.min(self.tokens.len());
        (range.start..end).find(|&i| self.is_open(i, name))
    }

    /// 여는 태그에 대응하는 닫는 태그 위치 (같은 이름의 중첩 고려).
    pub fn block_end(&self, open_idx: usize) -> Option<usize> {
        let name = self.tag(open_idx)?.name.clone();
        let mut depth = 0usize;
        for i in open_idx + 1..self.tokens.len() {
            if self.is_open(i, &name) {
                depth += 1;
            } else if self.is_close(i, &name) {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
        }
        None
    }

    /// 집합 태그 내부의 토큰 범위 (여는/닫는 태그 제외).
    ///
    /// 닫는 태그가 없으면 다음 같은 이름의 여는 태그 또는 문서 끝까지입니다.
    pub fn block_body(&self, open_idx: usize) -> Range<usize> {
        let start = open_idx + 1;
        let end = match self.block_end(open_idx) {
            Some(end) => end,
            None => {
                let name = self.tag(open_idx).map(|t| t.name.clone()).unwrap_or_default();
                (start..self.tokens.len())
                    .find(|&i| self.is_open(i, &name))
                    .unwrap_or(self.tokens.len())
            }
        };
        start..end
    }

    /// 여는 태그 바로 뒤 값 텍스트의 위치.
    pub fn value_index(&self, open_idx: usize) -> Option<usize> {
        match self.tokens.get(open_idx + 1) {
            Some(Token::Text(_)) if self.tag(open_idx).is_some() => Some(open_idx + 1),
            _ => None,
        }
    }

    /// 여는 태그 바로 뒤의 값 텍스트 (공백 포함 원문).
    pub fn value(&self, open_idx: usize) -> Option<&str> {
        self.value_index(open_idx).and_then(|i| self.text(i))
    }

    /// 값의 앞뒤 공백을 제거한 내용.
    pub fn trimmed_value(&self, open_idx: usize) -> Option<&str> {
        self.value(open_idx).map(str::trim)
    }

    /// 지정 위치의 텍스트.
    pub fn text(&self, idx: usize) -> Option<&str> {
        match self.tokens.get(idx) {
            Some(Token::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// 지정 위치의 텍스트 교체. 텍스트 토큰이 아니면 무시합니다.
    pub fn set_text(&mut self, idx: usize, text: impl Into<String>) {
        if let Some(Token::Text(existing)) = self.tokens.get_mut(idx) {
            *existing = text.into();
        }
    }

    /// 지정 위치에 토큰 삽입.
    pub fn insert(&mut self, idx: usize, token: Token) {
        let idx = idx.min(self.tokens.len());
        self.tokens.insert(idx, token);
    }

    /// 범위의 토큰 제거.
    pub fn remove_range(&mut self, range: Range<usize>) {
        let end = range.end.min(self.tokens.len());
        if range.start < end {
            self.tokens.drain(range.start..end);
        }
    }

    /// 텍스트 토큰을 모두 순회하며 변환합니다. 변경된 토큰 수를 반환합니다.
    pub fn map_texts(&mut self, mut f: impl FnMut(&str) -> Option<String>) -> usize {
        let mut changed = 0;
        for token in &mut self.tokens {
            if let Token::Text(text) = token {
                if let Some(new) = f(text) {
                    if new != *text {
                        *text = new;
                        changed += 1;
                    }
                }
            }
        }
        changed
    }

    /// 첫 여는 태그 이전 토큰 수 (헤더 영역).
    pub fn header_len(&self) -> usize {
        self.tokens
            .iter()
            .position(|t| matches!(t, Token::Tag(tag) if tag.kind == TagKind::Open))
            .unwrap_or(self.tokens.len())
    }

    /// 리프 요소에 닫는 태그를 쓰는 문서(XML 스타일)인지 여부.
    pub fn closes_leaves(&self) -> bool {
        (0..self.tokens.len()).any(|i| {
            self.tag(i)
                .filter(|t| t.kind == TagKind::Open)
                .map(|t| self.value_index(i).is_some() && self.is_close(i + 2, &t.name))
                .unwrap_or(false)
        })
    }

    /// 값이 있는 리프 요소의 토큰들 (`<NAME>value` 또는 `<NAME>value</NAME>`).
    pub fn leaf_tokens(name: &str, value: &str, closed: bool) -> Vec<Token> {
        let mut tokens = vec![Token::Tag(Tag::open(name)), Token::Text(value.to_string())];
        if closed {
            tokens.push(Token::Tag(Tag::close(name)));
        }
        tokens
    }

    /// 여러 토큰을 지정 위치에 순서대로 삽입.
    pub fn insert_all(&mut self, idx: usize, tokens: Vec<Token>) {
        let idx = idx.min(self.tokens.len());
        self.tokens.splice(idx..idx, tokens);
    }

    /// 주어진 이름의 첫 리프 값 (공백 제거).
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.opens(name)
            .into_iter()
            .find_map(|i| self.trimmed_value(i))
            .filter(|v| !v.is_empty())
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            f.write_str(token.raw())?;
        }
        Ok(())
    }
}

/// 텍스트를 첫 공백 이전의 단어와 나머지로 나눕니다.
pub(crate) fn split_word(text: &str) -> (&str, &str) {
    let end = text
        .find(|c: char| c.is_whitespace())
        .unwrap_or(text.len());
    text.split_at(end)
}

/// 텍스트를 앞 공백, 내용, 뒤 공백으로 나눕니다.
pub(crate) fn split_padded(text: &str) -> (&str, &str, &str) {
    let start = text.len() - text.trim_start().len();
    let end = text.trim_end().len().max(start);
    (&text[..start], &text[start..end], &text[end..])
}
