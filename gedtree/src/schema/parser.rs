use super::store::GrammarSchemaStore;
use super::types::{Cardinality, LineKind, SchemaBlock, SchemaHeader, SchemaLine, SchemaStructure};
use crate::error::{GedTreeError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

static STRUCTURE_DECL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z_][A-Z0-9_]*)\s*:=$").unwrap());
static HEADER_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z][A-Z0-9_]*)\s*=\s*(.*)$").unwrap());
static LEVEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:n|\+([1-9][0-9]?))$").unwrap());
static CARDINALITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{(\d+):(\d+|M)\*?\}\*?$").unwrap());
static STRUCTURE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<<([A-Z_][A-Z0-9_]*)>>$").unwrap());
static XREF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^@<([^<>@]+)>@$").unwrap());
static VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<([^<>]+)>$").unwrap());
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^_?[A-Z][A-Z0-9_]*$").unwrap());

const HEADER_VERSION: &str = "GEDCOM_VERSION";
const HEADER_SOURCE: &str = "GEDCOM_SOURCE";
const HEADER_DESCRIPTION: &str = "GEDCOM_DESCRIPTION";

/// Compile grammar definition text into a schema store.
pub fn parse_grammar_str(content: &str) -> Result<GrammarSchemaStore> {
    let lines = clean_lines(content);
    let (header, body_start) = parse_header(&lines)?;

    let mut structures = Vec::new();
    for (name, decl_line, body) in split_structures(&lines[body_start..])? {
        log::trace!("Compiling structure {name} ({} lines)", body.len());
        let variations = split_variations(decl_line, &body)?;
        for (variation, block_lines) in variations.into_iter().enumerate() {
            let block = parse_block(&block_lines, 0)?;
            structures.push(SchemaStructure {
                name: name.clone(),
                variation,
                block: Arc::new(block),
            });
        }
    }

    GrammarSchemaStore::build(header, structures)
}

/// A non-blank, comment-free source line
#[derive(Debug, Clone)]
struct SourceLine {
    number: usize,
    text: String,
}

/// A body line split into its level and remaining tokens
#[derive(Debug, Clone)]
struct BodyLine {
    number: usize,
    level: u8,
    tokens: Vec<String>,
}

fn clean_lines(content: &str) -> Vec<SourceLine> {
    content
        .lines()
        .enumerate()
        .filter_map(|(i, raw)| {
            let text = strip_comment(raw).split_whitespace().collect::<Vec<_>>().join(" ");
            if text.is_empty() || text.starts_with('#') {
                None
            } else {
                Some(SourceLine { number: i + 1, text })
            }
        })
        .collect()
}

/// `//` opens a comment only at the start of a line or after whitespace,
/// so URLs in the header survive.
fn strip_comment(raw: &str) -> &str {
    for (pos, _) in raw.match_indices("//") {
        if pos == 0 || raw[..pos].ends_with(char::is_whitespace) {
            return &raw[..pos];
        }
    }
    raw
}

fn parse_header(lines: &[SourceLine]) -> Result<(SchemaHeader, usize)> {
    let mut entries: Vec<(String, String)> = Vec::new();
    let mut body_start = lines.len();

    for (i, line) in lines.iter().enumerate() {
        if STRUCTURE_DECL.is_match(&line.text) {
            body_start = i;
            break;
        }
        if let Some(caps) = HEADER_ENTRY.captures(&line.text) {
            entries.push((caps[1].to_string(), caps[2].trim().to_string()));
        } else if let Some((_, value)) = entries.last_mut() {
            // Continuation of a multi-line value
            if !value.is_empty() {
                value.push(' ');
            }
            value.push_str(&line.text);
        } else {
            return Err(GedTreeError::schema(
                line.number,
                format!("Expected a KEY=VALUE header line, found '{}'", line.text),
            ));
        }
    }

    let mut header = SchemaHeader::default();
    let mut seen = [false; 3];
    for (key, value) in entries {
        match key.as_str() {
            HEADER_VERSION => {
                header.version = value;
                seen[0] = true;
            }
            HEADER_SOURCE => {
                header.source = value;
                seen[1] = true;
            }
            HEADER_DESCRIPTION => {
                header.description = value;
                seen[2] = true;
            }
            _ => header.extra.push((key, value)),
        }
    }

    let first_line = lines.first().map(|l| l.number).unwrap_or(1);
    for (key, present) in [HEADER_VERSION, HEADER_SOURCE, HEADER_DESCRIPTION]
        .iter()
        .zip(seen)
    {
        if !present {
            return Err(GedTreeError::schema(
                first_line,
                format!("Missing required header key '{key}'"),
            ));
        }
    }

    Ok((header, body_start))
}

/// Group body lines under their `NAME :=` declarations.
fn split_structures(lines: &[SourceLine]) -> Result<Vec<(String, usize, Vec<SourceLine>)>> {
    let mut blocks: Vec<(String, usize, Vec<SourceLine>)> = Vec::new();

    for line in lines {
        if let Some(caps) = STRUCTURE_DECL.captures(&line.text) {
            let name = caps[1].to_string();
            if blocks.iter().any(|(existing, _, _)| *existing == name) {
                return Err(GedTreeError::schema(
                    line.number,
                    format!("Structure '{name}' is declared more than once"),
                ));
            }
            blocks.push((name, line.number, Vec::new()));
        } else if let Some((_, _, body)) = blocks.last_mut() {
            body.push(SourceLine {
                number: line.number,
                text: normalize_brackets(&line.text),
            });
        }
    }

    for (name, decl_line, body) in &blocks {
        if body.is_empty() {
            return Err(GedTreeError::schema(
                *decl_line,
                format!("Structure '{name}' has no lines"),
            ));
        }
    }

    Ok(blocks)
}

fn normalize_brackets(text: &str) -> String {
    text.replace('[', " [ ")
        .replace(']', " ] ")
        .replace('|', " | ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a structure body into one line list per variation. A body whose
/// first line opens with `[` lists variations separated by `|` and closed by `]`.
fn split_variations(decl_line: usize, body: &[SourceLine]) -> Result<Vec<Vec<BodyLine>>> {
    let opens_variations = body
        .first()
        .map(|line| line.text.starts_with('['))
        .unwrap_or(false);

    if !opens_variations {
        let lines = body
            .iter()
            .map(|line| body_line(line.number, tokens_of(&line.text)))
            .collect::<Result<Vec<_>>>()?;
        return Ok(vec![lines]);
    }

    let mut variations: Vec<Vec<BodyLine>> = Vec::new();
    let mut current: Vec<BodyLine> = Vec::new();
    let mut opened = false;
    let mut closed = false;

    for line in body {
        let mut tokens = tokens_of(&line.text);

        // Leading separators
        while let Some(first) = tokens.first().map(String::as_str) {
            match first {
                "[" if !opened => opened = true,
                "[" => {
                    return Err(GedTreeError::schema(
                        line.number,
                        "Nested variation lists are not supported",
                    ))
                }
                "|" | "]" if !opened || closed => {
                    return Err(GedTreeError::schema(
                        line.number,
                        format!("Unexpected '{first}' outside a variation list"),
                    ))
                }
                "|" => finish_variation(line.number, &mut current, &mut variations)?,
                "]" => {
                    finish_variation(line.number, &mut current, &mut variations)?;
                    closed = true;
                }
                _ => break,
            }
            tokens.remove(0);
        }

        // Trailing separators that do not close a bracket opened on this line
        let mut trailing = Vec::new();
        loop {
            let balance = bracket_balance(&tokens);
            match tokens.last().map(String::as_str) {
                Some("]") if balance < 0 => trailing.push(tokens.pop()),
                Some("|") if balance == 0 => trailing.push(tokens.pop()),
                _ => break,
            }
        }

        if !tokens.is_empty() {
            if closed {
                return Err(GedTreeError::schema(
                    line.number,
                    "Line follows the closing ']' of a variation list",
                ));
            }
            current.push(body_line(line.number, tokens)?);
        }

        for separator in trailing.into_iter().rev().flatten() {
            if closed {
                return Err(GedTreeError::schema(
                    line.number,
                    format!("Unexpected '{separator}' after the variation list closed"),
                ));
            }
            finish_variation(line.number, &mut current, &mut variations)?;
            if separator == "]" {
                closed = true;
            }
        }
    }

    if !closed {
        return Err(GedTreeError::schema(
            decl_line,
            "Unterminated variation list: missing ']'",
        ));
    }

    Ok(variations)
}

fn finish_variation(
    line_number: usize,
    current: &mut Vec<BodyLine>,
    variations: &mut Vec<Vec<BodyLine>>,
) -> Result<()> {
    if current.is_empty() {
        return Err(GedTreeError::schema(line_number, "Empty variation"));
    }
    variations.push(std::mem::take(current));
    Ok(())
}

fn bracket_balance(tokens: &[String]) -> i32 {
    tokens.iter().fold(0, |balance, token| match token.as_str() {
        "[" => balance + 1,
        "]" => balance - 1,
        _ => balance,
    })
}

fn tokens_of(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

fn body_line(number: usize, mut tokens: Vec<String>) -> Result<BodyLine> {
    let marker = tokens.first().cloned().unwrap_or_default();
    let caps = LEVEL.captures(&marker).ok_or_else(|| {
        GedTreeError::schema(number, format!("Expected a level marker, found '{marker}'"))
    })?;
    let level = match caps.get(1) {
        Some(depth) => depth
            .as_str()
            .parse::<u8>()
            .map_err(|e| GedTreeError::schema(number, format!("Invalid level '{marker}': {e}")))?,
        None => 0,
    };
    tokens.remove(0);
    Ok(BodyLine {
        number,
        level,
        tokens,
    })
}

/// Parse consecutive lines at `level` into a block; deeper runs become the
/// child block of the line they follow.
fn parse_block(lines: &[BodyLine], level: u8) -> Result<SchemaBlock> {
    let mut schema_lines = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = &lines[i];
        if line.level != level {
            return Err(GedTreeError::schema(
                line.number,
                format!("Level jumps from {} to {}", level.saturating_sub(1), line.level),
            ));
        }

        let mut end = i + 1;
        while end < lines.len() && lines[end].level > level {
            end += 1;
        }

        let children = &lines[i + 1..end];
        let child_block = if children.is_empty() {
            None
        } else {
            if children[0].level != level + 1 {
                return Err(GedTreeError::schema(
                    children[0].number,
                    format!("Level jumps from {} to {}", level, children[0].level),
                ));
            }
            Some(Arc::new(parse_block(children, level + 1)?))
        };

        schema_lines.push(Arc::new(parse_line(line, child_block)?));
        i = end;
    }

    build_block(schema_lines, level)
}

fn build_block(lines: Vec<Arc<SchemaLine>>, level: u8) -> Result<SchemaBlock> {
    let mut index = HashMap::new();
    let mut mandatory = Vec::new();

    for (position, line) in lines.iter().enumerate() {
        for name in line.names() {
            if index.insert(name.to_string(), position).is_some() {
                return Err(GedTreeError::schema(
                    line.source_line,
                    format!("'{name}' is addressable by more than one line in the same block"),
                ));
            }
        }
        if line.cardinality.is_mandatory() {
            mandatory.push(position);
        }
    }

    Ok(SchemaBlock {
        lines,
        index,
        mandatory,
        level,
    })
}

#[derive(Debug)]
enum RawToken {
    Word(String),
    Alternatives(Vec<String>),
}

fn group_tokens(line: &BodyLine) -> Result<Vec<RawToken>> {
    let mut grouped = Vec::new();
    let mut tokens = line.tokens.iter();

    while let Some(token) = tokens.next() {
        match token.as_str() {
            "[" => {
                let mut alternatives = Vec::new();
                let mut terminated = false;
                for inner in tokens.by_ref() {
                    match inner.as_str() {
                        "]" => {
                            terminated = true;
                            break;
                        }
                        "|" => {}
                        "[" => {
                            return Err(GedTreeError::schema(
                                line.number,
                                "Nested brackets inside an alternative list",
                            ))
                        }
                        other => alternatives.push(other.to_string()),
                    }
                }
                if !terminated {
                    return Err(GedTreeError::schema(
                        line.number,
                        "Unterminated '[' alternative list",
                    ));
                }
                if alternatives.is_empty() {
                    return Err(GedTreeError::schema(line.number, "Empty alternative list"));
                }
                grouped.push(RawToken::Alternatives(alternatives));
            }
            "]" | "|" => {
                return Err(GedTreeError::schema(
                    line.number,
                    format!("Unexpected '{token}' outside an alternative list"),
                ))
            }
            _ => grouped.push(RawToken::Word(token.clone())),
        }
    }

    Ok(grouped)
}

#[derive(Default)]
struct LineFields {
    structure: Option<String>,
    tags: Vec<String>,
    xref_names: Vec<String>,
    value_names: Vec<String>,
    fixed_values: Vec<String>,
    xref_before_tag: bool,
    cardinality: Option<Cardinality>,
}

impl LineFields {
    fn add_xref(&mut self, name: &str) {
        if self.tags.is_empty() && self.structure.is_none() {
            self.xref_before_tag = true;
        }
        push_unique(&mut self.xref_names, name);
    }
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    if !list.iter().any(|existing| existing == item) {
        list.push(item.to_string());
    }
}

/// Turn one raw grammar line into a schema line. Tokens are tried as xref,
/// cardinality, structure reference, value and tag, in that order.
fn parse_line(line: &BodyLine, child_block: Option<Arc<SchemaBlock>>) -> Result<SchemaLine> {
    let mut fields = LineFields::default();

    for token in group_tokens(line)? {
        match token {
            RawToken::Word(word) => classify_word(line.number, &word, &mut fields)?,
            RawToken::Alternatives(alternatives) => {
                classify_alternatives(line.number, &alternatives, &mut fields)?
            }
        }
    }

    let cardinality = fields
        .cardinality
        .ok_or_else(|| GedTreeError::schema(line.number, "Missing {min:max} cardinality"))?;

    let kind = match (fields.structure, fields.tags.is_empty()) {
        (Some(_), false) => {
            return Err(GedTreeError::schema(
                line.number,
                "A line cannot reference a structure and carry tags",
            ))
        }
        (Some(name), true) => LineKind::Structure(name),
        (None, false) => LineKind::Tags(fields.tags),
        (None, true) => {
            return Err(GedTreeError::schema(
                line.number,
                "A line needs a tag or a structure reference",
            ))
        }
    };

    Ok(SchemaLine {
        kind,
        xref_names: fields.xref_names,
        value_names: fields.value_names,
        fixed_values: fields.fixed_values,
        xref_before_tag: fields.xref_before_tag,
        cardinality,
        child_block,
        source_line: line.number,
    })
}

fn classify_word(line_number: usize, word: &str, fields: &mut LineFields) -> Result<()> {
    if let Some(caps) = XREF.captures(word) {
        fields.add_xref(&caps[1]);
    } else if word.starts_with('{') {
        if fields.cardinality.is_some() {
            return Err(GedTreeError::schema(line_number, "Cardinality given twice"));
        }
        fields.cardinality = Some(parse_cardinality(line_number, word)?);
    } else if let Some(caps) = STRUCTURE_REF.captures(word) {
        if fields.structure.is_some() {
            return Err(GedTreeError::schema(line_number, "More than one structure reference"));
        }
        fields.structure = Some(caps[1].to_string());
    } else if let Some(caps) = VALUE.captures(word) {
        push_unique(&mut fields.value_names, &caps[1]);
    } else if TAG.is_match(word) && fields.tags.is_empty() && fields.structure.is_none() {
        fields.tags.push(word.to_string());
    } else if !fields.tags.is_empty() && !word.contains(['<', '>', '@', '{', '}']) {
        push_unique(&mut fields.fixed_values, word);
    } else {
        return Err(GedTreeError::schema(
            line_number,
            format!("Unrecognized token '{word}'"),
        ));
    }
    Ok(())
}

fn classify_alternatives(
    line_number: usize,
    alternatives: &[String],
    fields: &mut LineFields,
) -> Result<()> {
    let has_xref = alternatives.iter().any(|alt| alt.contains('@'));
    let has_value = alternatives.iter().any(|alt| VALUE.is_match(alt));

    if has_xref || has_value {
        for alt in alternatives {
            if let Some(caps) = XREF.captures(alt) {
                fields.add_xref(&caps[1]);
            } else if let Some(caps) = VALUE.captures(alt) {
                push_unique(&mut fields.value_names, &caps[1]);
            } else if alt.contains(['<', '>', '@']) {
                return Err(GedTreeError::schema(
                    line_number,
                    format!("Malformed alternative '{alt}'"),
                ));
            } else {
                push_unique(&mut fields.fixed_values, alt);
            }
        }
    } else if fields.tags.is_empty() && fields.structure.is_none() {
        if let Some(bad) = alternatives.iter().find(|alt| !TAG.is_match(alt)) {
            return Err(GedTreeError::schema(
                line_number,
                format!("Unrecognized tag '{bad}' in alternative list"),
            ));
        }
        for alt in alternatives {
            push_unique(&mut fields.tags, alt);
        }
    } else if !fields.tags.is_empty() {
        for alt in alternatives {
            push_unique(&mut fields.fixed_values, alt);
        }
    } else {
        return Err(GedTreeError::schema(
            line_number,
            "Alternative list after a structure reference",
        ));
    }
    Ok(())
}

fn parse_cardinality(line_number: usize, token: &str) -> Result<Cardinality> {
    let caps = CARDINALITY.captures(token).ok_or_else(|| {
        GedTreeError::schema(line_number, format!("Malformed cardinality '{token}'"))
    })?;
    let min = caps[1].parse::<u32>().map_err(|e| {
        GedTreeError::schema(line_number, format!("Malformed cardinality '{token}': {e}"))
    })?;
    let max = match &caps[2] {
        "M" => None,
        digits => match digits.parse::<u32>() {
            // `{n:0}` is the numeric spelling of `{n:M}`
            Ok(0) => None,
            Ok(max) => Some(max),
            Err(e) => {
                return Err(GedTreeError::schema(
                    line_number,
                    format!("Malformed cardinality '{token}': {e}"),
                ))
            }
        },
    };
    if let Some(max) = max {
        if min > max {
            return Err(GedTreeError::schema(
                line_number,
                format!("Cardinality '{token}' allows no lines"),
            ));
        }
    }
    Ok(Cardinality { min, max })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::LineKind;
    use crate::testing::{grammar, FAMILY_GRAMMAR};
    use pretty_assertions::assert_eq;

    fn expect_schema_error(text: &str) -> (usize, String) {
        match parse_grammar_str(text) {
            Err(GedTreeError::Schema { line, message }) => (line, message),
            Err(other) => panic!("Expected schema error, got {other}"),
            Ok(_) => panic!("Expected schema error, grammar compiled"),
        }
    }

    #[test]
    fn test_header_is_parsed() {
        let store = parse_grammar_str(FAMILY_GRAMMAR).unwrap();
        let header = store.header();
        assert_eq!(header.version, "5.5.1");
        assert_eq!(header.source, "https://example.org/gedcom551");
        assert_eq!(
            header.description,
            "Test grammar for families and individuals"
        );
    }

    #[test]
    fn test_missing_header_key() {
        let (_, message) = expect_schema_error(
            "GEDCOM_VERSION=5.5.1\nGEDCOM_SOURCE=x\nFAMILY :=\nn FAM {1:1}\n",
        );
        assert!(message.contains("GEDCOM_DESCRIPTION"));
    }

    #[test]
    fn test_comments_and_blank_lines_are_ignored() {
        let store = parse_grammar_str(&grammar(
            "# leading comment\nNOTE_ONLY :=\n\n n   NOTE   <TEXT>   {0:1} // trailing\n",
        ))
        .unwrap();
        let structure = &store.variations("NOTE_ONLY")[0];
        let line = structure.block().line("NOTE").unwrap();
        assert_eq!(line.value_names(), &["TEXT".to_string()]);
    }

    #[test]
    fn test_tokens_are_classified() {
        let store = parse_grammar_str(FAMILY_GRAMMAR).unwrap();
        let family = &store.variations("FAMILY")[0];
        let fam = family.block().line("FAM").unwrap();
        assert!(fam.xref_before_tag());
        assert_eq!(fam.xref_names(), &["XREF:FAM".to_string()]);

        let block = fam.child_block().unwrap();
        let husb = block.line("HUSB").unwrap();
        assert_eq!(husb.tags(), &["HUSB".to_string(), "WIFE".to_string()]);
        assert!(!husb.xref_before_tag());
        assert_eq!(husb.max(), Some(1));
        assert!(std::ptr::eq(
            husb.as_ref(),
            block.line("WIFE").unwrap().as_ref()
        ));

        let chil = block.line("CHIL").unwrap();
        assert_eq!(chil.max(), None);

        let event = block.line("EVENT_DETAIL").unwrap();
        assert_eq!(event.kind(), &LineKind::Structure("EVENT_DETAIL".into()));

        let marr = block.line("MARR").unwrap();
        assert_eq!(marr.fixed_values(), &["Y".to_string()]);
        assert_eq!(marr.value_names(), &["NULL".to_string()]);
        assert!(marr.requires_value());
    }

    #[test]
    fn test_nested_levels_build_child_blocks() {
        let store = parse_grammar_str(FAMILY_GRAMMAR).unwrap();
        let individual = &store.variations("INDIVIDUAL")[0];
        let indi = individual.block().line("INDI").unwrap();
        let name = indi.child_block().unwrap().line("NAME").unwrap();
        let name_block = name.child_block().unwrap();
        assert_eq!(name_block.level(), 2);
        assert!(name_block.contains("GIVN"));
        assert!(name_block.contains("SURN"));
    }

    #[test]
    fn test_variations_are_split() {
        let store = parse_grammar_str(FAMILY_GRAMMAR).unwrap();
        let notes = store.variations("NOTE_STRUCTURE");
        assert_eq!(notes.len(), 2);
        assert!(notes[0].top_line("NOTE").unwrap().has_xref());
        assert!(notes[1].top_line("NOTE").unwrap().has_value());
        assert!(notes[1]
            .top_line("NOTE")
            .unwrap()
            .child_block()
            .unwrap()
            .contains("CONT"));
    }

    #[test]
    fn test_inline_variation_separators() {
        let store = parse_grammar_str(&grammar(
            "LINK :=\n[ n OBJE @<XREF:OBJE>@ {1:1}\n| n OBJE {1:1}\n+1 FILE <FILE_REF> {1:1} ]\n",
        ))
        .unwrap();
        let links = store.variations("LINK");
        assert_eq!(links.len(), 2);
        assert!(links[1].top_line("OBJE").unwrap().child_block().is_some());
    }

    #[test]
    fn test_unterminated_variation_list() {
        let (_, message) =
            expect_schema_error(&grammar("LINK :=\n[\nn OBJE {1:1}\n|\nn FILE {1:1}\n"));
        assert!(message.contains("Unterminated"));
    }

    #[test]
    fn test_malformed_cardinality() {
        let (line, message) = expect_schema_error(&grammar("BROKEN :=\nn NOTE {1-M}\n"));
        assert!(message.contains("Malformed cardinality"));
        assert_eq!(line, 5);
    }

    #[test]
    fn test_cardinality_suffix_is_accepted() {
        let store = parse_grammar_str(&grammar("STAR :=\nn NOTE {1:1*}\nn TEXT {0:M}*\n")).unwrap();
        let block = store.variations("STAR")[0].block().clone();
        assert_eq!(block.line("NOTE").unwrap().min(), 1);
        assert_eq!(block.line("TEXT").unwrap().max(), None);
    }

    #[test]
    fn test_zero_maximum_is_unbounded() {
        let store = parse_grammar_str(&grammar("OPEN :=\nn NOTE {0:0}\nn TEXT {2:0}\n")).unwrap();
        let block = store.variations("OPEN")[0].block().clone();
        let note = block.line("NOTE").unwrap();
        assert_eq!(note.max(), None);
        assert!(!note.cardinality().is_reached(1000));
        let text = block.line("TEXT").unwrap();
        assert_eq!(text.cardinality(), Cardinality { min: 2, max: None });
        assert_eq!(text.cardinality().to_string(), "{2:M}");

        let (_, message) = expect_schema_error(&grammar("TIGHT :=\nn NOTE {2:1}\n"));
        assert!(message.contains("allows no lines"));
    }

    #[test]
    fn test_level_jump_is_rejected() {
        let (_, message) = expect_schema_error(&grammar("JUMP :=\nn NOTE {1:1}\n+2 CONT {0:M}\n"));
        assert!(message.contains("Level jumps"));
    }

    #[test]
    fn test_first_line_must_be_top_level() {
        let (_, message) = expect_schema_error(&grammar("JUMP :=\n+1 NOTE {1:1}\n"));
        assert!(message.contains("Level jumps"));
    }

    #[test]
    fn test_structure_and_tag_on_one_line() {
        let (_, message) =
            expect_schema_error(&grammar("BOTH :=\nn NOTE <<NOTE_STRUCTURE>> {1:1}\n"));
        assert!(message.contains("structure"));
    }

    #[test]
    fn test_unrecognized_token() {
        let (_, message) = expect_schema_error(&grammar("ODD :=\nn note {1:1}\n"));
        assert!(message.contains("Unrecognized"));
    }

    #[test]
    fn test_duplicate_name_in_block() {
        let (_, message) =
            expect_schema_error(&grammar("DUP :=\nn NOTE {0:1}\nn [TEXT|NOTE] {0:1}\n"));
        assert!(message.contains("more than one line"));
    }

    #[test]
    fn test_duplicate_structure_declaration() {
        let (_, message) =
            expect_schema_error(&grammar("ONE :=\nn NOTE {0:1}\nONE :=\nn TEXT {0:1}\n"));
        assert!(message.contains("declared more than once"));
    }

    #[test]
    fn test_missing_cardinality() {
        let (_, message) = expect_schema_error(&grammar("NOCARD :=\nn NOTE <TEXT>\n"));
        assert!(message.contains("cardinality"));
    }

    #[test]
    fn test_xref_alternatives() {
        let store = parse_grammar_str(&grammar(
            "ASSO :=\nn ASSO [@<XREF:INDI>@|@<XREF:FAM>@|<NULL>] {0:M}\n",
        ))
        .unwrap();
        let line = store.variations("ASSO")[0].block().line("ASSO").unwrap().clone();
        assert_eq!(
            line.xref_names(),
            &["XREF:INDI".to_string(), "XREF:FAM".to_string()]
        );
        assert_eq!(line.value_names(), &["NULL".to_string()]);
        assert!(!line.requires_value());
        assert!(line.requires_xref());
    }
}
