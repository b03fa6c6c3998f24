//! Parameter types embedded in reST docstrings
//!
//! Recognised lines:
//!
//! ```text
//! :type name: T
//! :vartype name: T
//! :param T name: description
//! ```
//!
//! `T` uses the loose docstring grammar (`int or str`, `list(int)`,
//! `(int, str)`, `list, tuple`) and is rewritten to annotation text before it
//! reaches [`parse_annotation`].

use crate::core::classes::TypeContext;
use crate::core::types::Type;
use crate::errors::DeclarationError;
use crate::frontend::annotation::parse_annotation;
use crate::runtime::function::Function;
use tracing::debug;

const TYPE_TAGS: &[&str] = &[":type", ":vartype"];
const PARAM_TAGS: &[&str] = &[":param", ":parameter", ":arg", ":argument", ":key", ":keyword"];

fn strip_tag<'a>(line: &'a str, tags: &[&str]) -> Option<&'a str> {
    tags.iter().find_map(|tag| {
        let rest = line.strip_prefix(tag)?;
        rest.starts_with(char::is_whitespace).then_some(rest)
    })
}

/// Raw `(name, type text)` pairs in docstring order
pub fn extract_types(doc: &str) -> Vec<(String, String)> {
    let mut found = Vec::new();
    for line in doc.lines().map(str::trim) {
        if let Some(rest) = strip_tag(line, TYPE_TAGS) {
            if let Some((name, ty)) = rest.split_once(':') {
                let (name, ty) = (name.trim(), ty.trim());
                if !name.is_empty() && !ty.is_empty() {
                    found.push((name.to_string(), ty.to_string()));
                }
            }
        } else if let Some(rest) = strip_tag(line, PARAM_TAGS) {
            let Some((head, _)) = rest.split_once(':') else {
                continue;
            };
            // `:param T name:`; a bare `:param name:` carries no type
            let words: Vec<&str> = head.split_whitespace().collect();
            if let [ty @ .., name] = words.as_slice() {
                if !ty.is_empty() {
                    found.push((name.to_string(), ty.join(" ")));
                }
            }
        }
    }
    found
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Open(char),
    Close(char),
    Comma,
    Or,
}

fn tokenize(text: &str) -> Result<Vec<Token>, DeclarationError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '(' | '[' => {
                tokens.push(Token::Open(c));
                chars.next();
            }
            ')' | ']' => {
                tokens.push(Token::Close(c));
                chars.next();
            }
            ',' => {
                tokens.push(Token::Comma);
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if !(c.is_alphanumeric() || c == '_' || c == '.') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(if word == "or" { Token::Or } else { Token::Name(word) });
            }
            other => {
                return Err(DeclarationError::InvalidAnnotation {
                    text: text.to_string(),
                    message: format!("unexpected character {:?} in docstring type", other),
                })
            }
        }
    }
    Ok(tokens)
}

struct Translator<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Translator<'a> {
    fn error(&self, message: &str) -> DeclarationError {
        DeclarationError::InvalidAnnotation {
            text: self.text.to_string(),
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    /// Alternatives joined by `or`; at the top level commas also separate alternatives
    fn alternatives(&mut self, commas: bool) -> Result<String, DeclarationError> {
        let mut branches = vec![self.item()?];
        while let Some(token) = self.peek() {
            match token {
                Token::Or => {}
                Token::Comma if commas => {}
                _ => break,
            }
            self.pos += 1;
            branches.push(self.item()?);
        }
        Ok(branches.join(" | "))
    }

    fn arguments(&mut self, close: char) -> Result<Vec<String>, DeclarationError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::Close(close)) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.alternatives(false)?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::Close(c)) if c == close => return Ok(args),
                _ => return Err(self.error("unbalanced brackets")),
            }
        }
    }

    fn item(&mut self) -> Result<String, DeclarationError> {
        match self.next() {
            Some(Token::Name(name)) => match self.peek() {
                Some(Token::Open(open)) => {
                    let close = if *open == '(' { ')' } else { ']' };
                    self.pos += 1;
                    let args = self.arguments(close)?;
                    if args.is_empty() {
                        Ok(name)
                    } else {
                        Ok(format!("{}[{}]", name, args.join(", ")))
                    }
                }
                _ => Ok(name),
            },
            Some(Token::Open('(')) => {
                let args = self.arguments(')')?;
                Ok(format!("Tuple[{}]", args.join(", ")))
            }
            _ => Err(self.error("expected a type name")),
        }
    }
}

/// Rewrite docstring type text as annotation text.
///
/// `list(int)` becomes `list[int]`, `(int, str)` becomes `Tuple[int, str]`,
/// and `int or str` as well as a top level `list, tuple` become unions.
pub fn translate(text: &str) -> Result<String, DeclarationError> {
    let tokens = tokenize(text)?;
    let mut translator = Translator { text, tokens, pos: 0 };
    let translated = translator.alternatives(true)?;
    if translator.pos < translator.tokens.len() {
        return Err(translator.error("trailing tokens"));
    }
    Ok(translated)
}

/// Parameter types declared in a docstring
pub fn docstring_types(doc: &str, ctx: &TypeContext) -> Result<Vec<(String, Type)>, DeclarationError> {
    extract_types(doc)
        .into_iter()
        .map(|(name, text)| Ok((name, parse_annotation(&translate(&text)?, ctx)?)))
        .collect()
}

/// Copy of `function` whose unannotated parameters take their types from its docstring
pub fn fill_from_docstring(function: &Function, ctx: &TypeContext) -> Result<Function, DeclarationError> {
    let mut filled = function.duplicate();
    let Some(doc) = function.doc() else {
        return Ok(filled);
    };
    let types = docstring_types(doc, ctx)?;
    for param in filled.signature_mut().params_mut() {
        if param.annotation.is_some() {
            continue;
        }
        if let Some((_, ty)) = types.iter().find(|(name, _)| *name == param.name) {
            debug!(function = function.name(), param = %param.name, ty = %ty, "annotation from docstring");
            param.annotation = Some(ty.clone());
        }
    }
    Ok(filled)
}
