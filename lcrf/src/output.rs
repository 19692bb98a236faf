//! Outputters for labeled sequences: column, JSON, annotated text and
//! morphology layouts.

use std::io::Write;

use serde::Serialize;

use crate::errors::Result;
use crate::token::TokenWithTag;

/// Capability set of an outputter: framing, per-sequence emission, and an
/// evaluation variant carrying the predicted labels next to the gold ones.
pub trait Outputter {
    /// Actions before anything is emitted.
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    /// Actions after everything is emitted.
    fn end(&mut self) -> Result<()> {
        Ok(())
    }

    /// Resets the outputter to its initial state.
    fn reset(&mut self) {}

    /// Emits a labeled sequence.
    fn emit(&mut self, sentence: &[TokenWithTag]) -> Result<()>;

    /// Evaluation mode: the sequence carries the gold labels, `predicted`
    /// the model's output.
    fn emit_with_gold(&mut self, _sentence: &[TokenWithTag], _predicted: &[String]) -> Result<()> {
        Ok(())
    }
}

/// One token per line: `LABEL TOKEN CLASS (OFFSET,LENGTH)`, tab-separated,
/// sequences separated by an empty line.
pub struct ColumnOutputter<W> {
    out: W,
}

impl<W> ColumnOutputter<W>
where
    W: Write,
{
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W> Outputter for ColumnOutputter<W>
where
    W: Write,
{
    fn emit(&mut self, sentence: &[TokenWithTag]) -> Result<()> {
        for t in sentence {
            writeln!(self.out, "{t}")?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn emit_with_gold(&mut self, sentence: &[TokenWithTag], predicted: &[String]) -> Result<()> {
        for (t, inferred) in sentence.iter().zip(predicted) {
            write!(
                self.out,
                "{}\t({},{})\t{}\t{}",
                t.token, t.offset, t.length, inferred, t.label
            )?;
            writeln!(self.out, "{}", if *inferred != t.label { "\t!!!" } else { "" })?;
        }
        writeln!(self.out)?;
        Ok(())
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct Entity {
    surface: String,
    entity_type: String,
    start: usize,
    end: usize,
}

#[derive(Serialize)]
struct EntityList {
    entities: Vec<Entity>,
}

// Reassembles entity spans from BIO/BILOU token labels. `start`/`end` form a
// half-open byte interval.
fn collect_entities(sentence: &[TokenWithTag], default_label: &str, into: &mut Vec<Entity>) {
    let mut open: Option<Entity> = None;
    for t in sentence {
        if t.label == default_label || t.label.len() < 2 {
            // BIO has no end marker; a default label closes any open span.
            if let Some(e) = open.take() {
                into.push(e);
            }
            continue;
        }
        let (ne_type, ne_suffix) = t.label.split_at(t.label.len() - 2);
        match ne_suffix {
            "_U" => {
                if let Some(e) = open.take() {
                    into.push(e);
                }
                into.push(Entity {
                    surface: t.token.clone(),
                    entity_type: ne_type.to_string(),
                    start: t.offset,
                    end: t.offset + t.length,
                });
            }
            "_B" => {
                if let Some(e) = open.take() {
                    into.push(e);
                }
                open = Some(Entity {
                    surface: t.token.clone(),
                    entity_type: ne_type.to_string(),
                    start: t.offset,
                    end: t.offset + t.length,
                });
            }
            "_I" | "_L" => {
                if let Some(e) = open.as_mut() {
                    e.surface.push(' ');
                    e.surface.push_str(&t.token);
                    e.end = t.offset + t.length;
                }
                if ne_suffix == "_L" {
                    if let Some(e) = open.take() {
                        into.push(e);
                    }
                }
            }
            _ => {
                if let Some(e) = open.take() {
                    into.push(e);
                }
            }
        }
    }
    if let Some(e) = open.take() {
        into.push(e);
    }
}

/// Structured JSON output: `{"entities": [{surface, entity_type, start,
/// end}, …]}`. Entities are buffered and written by [`Outputter::end()`].
pub struct JsonOutputter<W> {
    out: W,
    default_label: String,
    pretty: bool,
    entities: Vec<Entity>,
}

impl<W> JsonOutputter<W>
where
    W: Write,
{
    pub fn new(out: W, default_label: &str) -> Self {
        Self {
            out,
            default_label: default_label.to_string(),
            pretty: true,
            entities: vec![],
        }
    }

    pub fn pretty(mut self, v: bool) -> Self {
        self.pretty = v;
        self
    }
}

impl<W> Outputter for JsonOutputter<W>
where
    W: Write,
{
    fn begin(&mut self) -> Result<()> {
        self.entities.clear();
        Ok(())
    }

    fn emit(&mut self, sentence: &[TokenWithTag]) -> Result<()> {
        collect_entities(sentence, &self.default_label, &mut self.entities);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        let list = EntityList {
            entities: std::mem::take(&mut self.entities),
        };
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.out, &list)
                .map_err(std::io::Error::from)?;
        } else {
            serde_json::to_writer(&mut self.out, &list).map_err(std::io::Error::from)?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn reset(&mut self) {
        self.entities.clear();
    }
}

/// Re-inserts `<ne class="…">…</ne>` markup into running text.
pub struct AnnotationOutputter<W> {
    out: W,
    default_label: String,
}

impl<W> AnnotationOutputter<W>
where
    W: Write,
{
    pub fn new(out: W, default_label: &str) -> Self {
        Self {
            out,
            default_label: default_label.to_string(),
        }
    }

    fn needs_space(prev: Option<&TokenWithTag>, t: &TokenWithTag) -> bool {
        let Some(prev) = prev else {
            return false;
        };
        if matches!(
            t.token_class.as_str(),
            "PUNCT" | "R_QUOTE" | "R_BRACKET" | "GENITIVE_SUFFIX"
        ) {
            return false;
        }
        !matches!(prev.token_class.as_str(), "L_QUOTE" | "L_BRACKET")
    }
}

impl<W> Outputter for AnnotationOutputter<W>
where
    W: Write,
{
    fn emit(&mut self, sentence: &[TokenWithTag]) -> Result<()> {
        let mut in_ne = false;
        let mut prev: Option<&TokenWithTag> = None;
        for (i, t) in sentence.iter().enumerate() {
            if t.label == self.default_label || t.label.len() < 2 {
                if in_ne {
                    write!(self.out, "</ne>")?;
                    in_ne = false;
                }
                if i > 0 && Self::needs_space(prev, t) {
                    write!(self.out, " ")?;
                }
                write!(self.out, "{}", t.token)?;
            } else {
                let (ne_type, ne_suffix) = t.label.split_at(t.label.len() - 2);
                match ne_suffix {
                    "_B" => {
                        if i > 0 {
                            write!(self.out, " ")?;
                        }
                        write!(self.out, "<ne class=\"{}\">{}", ne_type, t.token)?;
                        in_ne = true;
                    }
                    "_U" => {
                        if i > 0 {
                            write!(self.out, " ")?;
                        }
                        write!(self.out, "<ne class=\"{}\">{}</ne>", ne_type, t.token)?;
                    }
                    _ => {
                        write!(self.out, " {}", t.token)?;
                        if ne_suffix == "_L" && in_ne {
                            write!(self.out, "</ne>")?;
                            in_ne = false;
                        }
                    }
                }
            }
            prev = Some(t);
        }
        if in_ne {
            write!(self.out, "</ne>")?;
        }
        writeln!(self.out)?;
        Ok(())
    }
}

/// Morphology layout: the tokens space-joined, a tab, then the labels
/// space-joined.
pub struct MorphOutputter<W> {
    out: W,
}

impl<W> MorphOutputter<W>
where
    W: Write,
{
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W> Outputter for MorphOutputter<W>
where
    W: Write,
{
    fn emit(&mut self, sentence: &[TokenWithTag]) -> Result<()> {
        if sentence.is_empty() {
            return Ok(());
        }
        let tokens: Vec<&str> = sentence.iter().map(|t| t.token.as_str()).collect();
        let labels: Vec<&str> = sentence.iter().map(|t| t.label.as_str()).collect();
        writeln!(self.out, "{}\t{}", tokens.join(" "), labels.join(" "))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence() -> Vec<TokenWithTag> {
        let rows = [
            ("Angela", "WORD", "PER_B", 0, 6),
            ("Merkel", "WORD", "PER_I", 7, 6),
            ("met", "WORD", "OTHER", 14, 3),
            ("Obama", "WORD", "PER_B", 18, 5),
            (".", "PUNCT", "OTHER", 24, 1),
        ];
        rows.iter()
            .map(|&(tok, class, label, offset, length)| {
                let mut t = TokenWithTag::with_class(tok, class, offset, length);
                t.assign_label(label);
                t
            })
            .collect()
    }

    #[test]
    fn test_collect_entities_bio() {
        let mut entities = vec![];
        collect_entities(&sentence(), "OTHER", &mut entities);
        assert_eq!(
            vec![
                Entity {
                    surface: "Angela Merkel".to_string(),
                    entity_type: "PER".to_string(),
                    start: 0,
                    end: 13,
                },
                Entity {
                    surface: "Obama".to_string(),
                    entity_type: "PER".to_string(),
                    start: 18,
                    end: 23,
                },
            ],
            entities
        );
    }

    #[test]
    fn test_collect_entities_bilou() {
        let mut s = sentence();
        s[1].assign_label("PER_L");
        s[3].assign_label("PER_U");
        let mut entities = vec![];
        collect_entities(&s, "OTHER", &mut entities);
        assert_eq!(2, entities.len());
        assert_eq!("Angela Merkel", entities[0].surface);
        assert_eq!("Obama", entities[1].surface);
    }

    #[test]
    fn test_json_outputter() {
        let mut buf = vec![];
        {
            let mut outputter = JsonOutputter::new(&mut buf, "OTHER").pretty(false);
            outputter.begin().unwrap();
            outputter.emit(&sentence()).unwrap();
            outputter.end().unwrap();
        }
        let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        let entities = v["entities"].as_array().unwrap();
        assert_eq!(2, entities.len());
        assert_eq!("Angela Merkel", entities[0]["surface"]);
        assert_eq!("PER", entities[0]["entity_type"]);
        assert_eq!(0, entities[0]["start"]);
        assert_eq!(13, entities[0]["end"]);
    }

    #[test]
    fn test_column_outputter() {
        let mut buf = vec![];
        ColumnOutputter::new(&mut buf).emit(&sentence()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!("PER_B\tAngela\tWORD\t(0,6)", lines[0]);
        assert_eq!("OTHER\t.\tPUNCT\t(24,1)", lines[4]);
        assert_eq!("", lines[5]);
    }

    #[test]
    fn test_column_outputter_eval_marks_mismatches() {
        let mut buf = vec![];
        let predicted: Vec<String> = ["PER_B", "OTHER", "OTHER", "PER_B", "OTHER"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        ColumnOutputter::new(&mut buf)
            .emit_with_gold(&sentence(), &predicted)
            .unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!("Angela\t(0,6)\tPER_B\tPER_B", lines[0]);
        assert_eq!("Merkel\t(7,6)\tOTHER\tPER_I\t!!!", lines[1]);
    }

    #[test]
    fn test_annotation_outputter() {
        let mut buf = vec![];
        AnnotationOutputter::new(&mut buf, "OTHER")
            .emit(&sentence())
            .unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            "<ne class=\"PER\">Angela Merkel</ne> met <ne class=\"PER\">Obama</ne>.\n",
            text
        );
    }

    #[test]
    fn test_morph_outputter() {
        let mut buf = vec![];
        MorphOutputter::new(&mut buf).emit(&sentence()).unwrap();
        assert_eq!(
            "Angela Merkel met Obama .\tPER_B PER_I OTHER PER_B OTHER\n",
            String::from_utf8(buf).unwrap()
        );
    }
}
