//! Text model dumps: a labeled section grammar used for third-party
//! interop. Only first-order models are reloadable from this format.

use std::io::{BufRead, Write};

use crate::errors::{LcrfError, Result};
use crate::mapper::StringIdMapper;
use crate::model::CrfModel;
use crate::state::StateId;

/// Writes a model as a text dump with `FILEHEADER`, `LABELS`, `ATTRIBUTES`,
/// `TRANSITIONS` and `STATE_FEATURES` sections.
pub fn write_text_model<W>(model: &CrfModel, mut out: W) -> Result<()>
where
    W: Write,
{
    writeln!(out, "FILEHEADER = {{")?;
    writeln!(out, "  model_type: crf_hmm")?;
    writeln!(out, "  model_order: {}", model.order())?;
    writeln!(out, "  num_features: {}", model.features_count())?;
    writeln!(out, "  num_labels: {}", model.labels_count())?;
    if model.order() > 1 {
        writeln!(out, "  num_states: {}", model.states_count())?;
    }
    writeln!(out, "  num_attrs: {}", model.attributes_count())?;
    writeln!(out, "  num_transitions: {}", model.transitions_count())?;
    writeln!(out, "  num_params: {}", model.parameters_count())?;
    writeln!(out, "}}")?;
    writeln!(out)?;

    writeln!(out, "LABELS = {{")?;
    for (id, s) in model.labels_mapper().iter() {
        writeln!(out, "  {id}: {s}")?;
    }
    writeln!(out, "}}")?;
    writeln!(out)?;

    writeln!(out, "ATTRIBUTES = {{")?;
    for (id, s) in model.attributes_mapper().iter() {
        writeln!(out, "  {id}: {s}")?;
    }
    writeln!(out, "}}")?;
    writeln!(out)?;

    writeln!(out, "TRANSITIONS = {{")?;
    if model.order() == 1 {
        for to in 0..model.labels_count() {
            let to_id = StateId::try_from(to)?;
            for (from, weight) in model.ingoing_transitions_of(to_id) {
                writeln!(
                    out,
                    "  (1) {} --> {}: {}",
                    model.label_of(u16::try_from(from)?),
                    model.label_of(u16::try_from(to)?),
                    weight
                )?;
            }
        }
    } else {
        for from in 0..model.states_count() {
            let from_id = StateId::try_from(from)?;
            let from_s = model
                .crf_state(from_id)
                .display(|l| model.label_of(l));
            for (to, weight) in model.outgoing_transitions_of(from_id) {
                let to_s = model.crf_state(to).display(|l| model.label_of(l));
                writeln!(out, "  (1) {from_s} --> {to_s}: {weight}")?;
            }
        }
    }
    writeln!(out, "}}")?;
    writeln!(out)?;

    writeln!(out, "STATE_FEATURES = {{")?;
    for (a_id, attr) in model.attributes_mapper().iter() {
        for &(label, p) in model.labels_for_attribute(a_id) {
            let weight = model.weight(p);
            if weight != 0.0 {
                writeln!(out, "  (0) {} --> {}: {}", attr, model.label_of(label), weight)?;
            }
        }
    }
    writeln!(out, "}}")?;
    writeln!(out)?;
    Ok(())
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum Section {
    Intermediate,
    Header,
    Labels,
    Attributes,
    Transitions,
    StateFeatures,
}

/// Reads a first-order model from a text dump written by
/// [`write_text_model()`] (or a compatible tool).
pub fn read_text_model<R>(rdr: R) -> Result<CrfModel>
where
    R: BufRead,
{
    let mut section = Section::Intermediate;
    let mut labels = StringIdMapper::new();
    let mut attributes = StringIdMapper::new();
    let mut transitions: Vec<(String, String, f64)> = vec![];
    let mut features: Vec<(String, String, f64)> = vec![];

    for (line_no, line) in rdr.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if section == Section::Intermediate {
            section = match trimmed {
                "FILEHEADER = {" => Section::Header,
                "LABELS = {" => Section::Labels,
                "ATTRIBUTES = {" => Section::Attributes,
                "TRANSITIONS = {" => Section::Transitions,
                "STATE_FEATURES = {" => Section::StateFeatures,
                _ => Section::Intermediate,
            };
            continue;
        }
        if trimmed == "}" {
            section = Section::Intermediate;
            continue;
        }
        match section {
            Section::Header => {
                if let Some((key, value)) = split_colon(trimmed) {
                    if key == "model_order" {
                        let order: usize = value
                            .parse()
                            .map_err(|_| LcrfError::invalid_model("invalid model_order"))?;
                        if order != 1 {
                            return Err(LcrfError::invalid_model(
                                "text dumps are reloadable for first-order models only",
                            ));
                        }
                    }
                }
            }
            Section::Labels => {
                if let Some((id, label)) = parse_id_entry(trimmed) {
                    labels.add(label, id);
                } else {
                    eprintln!("Error in line {}: invalid label entry.", line_no + 1);
                }
            }
            Section::Attributes => {
                if let Some((id, attr)) = parse_id_entry(trimmed) {
                    attributes.add(attr, id);
                } else {
                    eprintln!("Error in line {}: invalid attribute entry.", line_no + 1);
                }
            }
            Section::Transitions => {
                if let Some(entry) = parse_arrow_entry(trimmed) {
                    transitions.push(entry);
                } else {
                    eprintln!("Error in line {}: invalid transition entry.", line_no + 1);
                }
            }
            Section::StateFeatures => {
                if let Some(entry) = parse_arrow_entry(trimmed) {
                    features.push(entry);
                } else {
                    eprintln!("Error in line {}: invalid state feature entry.", line_no + 1);
                }
            }
            Section::Intermediate => {}
        }
    }

    let mut model = CrfModel::new(labels, attributes, 1)?;
    for (from, to, weight) in transitions {
        match (model.label_id_of(&from), model.label_id_of(&to)) {
            (Some(from), Some(to)) => {
                model.add_transition_weighted(StateId::from(from), StateId::from(to), weight);
            }
            _ => eprintln!("Invalid transition entry: {from} --> {to}"),
        }
    }
    for (attr, label, weight) in features {
        match (model.attr_id_of(&attr), model.label_id_of(&label)) {
            (Some(attr), Some(label)) => {
                model.add_feature_weighted(label, attr, weight);
            }
            _ => eprintln!("Invalid state feature entry: {attr} --> {label}"),
        }
    }
    model.finalise();
    Ok(model)
}

// `  0: <BOS>`
fn parse_id_entry(line: &str) -> Option<(u32, &str)> {
    let (id, value) = split_colon(line)?;
    Some((id.parse().ok()?, value))
}

// `  (1) LHS --> RHS: weight`
fn parse_arrow_entry(line: &str) -> Option<(String, String, f64)> {
    let rest = if let Some(close) = line.strip_prefix('(') {
        close.split_once(')')?.1.trim_start()
    } else {
        line
    };
    let (lhs, rhs) = rest.split_once(" --> ")?;
    let (rhs, weight) = rhs.rsplit_once(':')?;
    Some((
        lhs.trim().to_string(),
        rhs.trim().to_string(),
        weight.trim().parse().ok()?,
    ))
}

fn split_colon(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    Some((key.trim(), value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;

    fn sample_model() -> CrfModel {
        let mut labels = StringIdMapper::new();
        labels.add("<BOS>", 0);
        labels.add("A", 1);
        labels.add("B", 2);
        let mut attrs = StringIdMapper::new();
        attrs.add("W[0]=x", 0);
        attrs.add("W[0]=y", 1);
        let mut model = CrfModel::new(labels, attrs, 1).unwrap();
        model.add_transition_weighted(1, 2, 0.75);
        model.add_transition_weighted(2, 1, -0.25);
        model.add_feature_weighted(1, 0, 1.5);
        model.add_feature_weighted(2, 1, 2.5);
        model.add_feature_weighted(2, 0, -0.5);
        model.finalise();
        model
    }

    #[test]
    fn test_dump_round_trip() {
        let model = sample_model();
        let mut buf = vec![];
        write_text_model(&model, &mut buf).unwrap();
        let reloaded = read_text_model(buf.as_slice()).unwrap();

        assert_eq!(model.labels_count(), reloaded.labels_count());
        assert_eq!(model.attributes_count(), reloaded.attributes_count());
        assert_eq!(model.transitions_count(), reloaded.transitions_count());
        assert_eq!(model.features_count(), reloaded.features_count());
        assert_eq!(0.75, reloaded.transition_weight(1, 2));
        assert_eq!(-0.25, reloaded.transition_weight(2, 1));
        let p = reloaded.feature_param_index(1, 2).unwrap();
        assert_eq!(2.5, reloaded.weight(p));

        let mut decoder = Decoder::new();
        let input = vec![vec![0], vec![1], vec![0]];
        let mut out1 = vec![];
        let mut out2 = vec![];
        let s1 = decoder.best_sequence(&model, &input, &mut out1);
        let s2 = decoder.best_sequence(&reloaded, &input, &mut out2);
        assert_eq!(out1, out2);
        assert!((s1 - s2).abs() < 1e-12);
    }

    #[test]
    fn test_reader_rejects_higher_order_dump() {
        let dump = "FILEHEADER = {\n  model_order: 2\n}\n";
        assert!(read_text_model(dump.as_bytes()).is_err());
    }

    #[test]
    fn test_parse_arrow_entry() {
        assert_eq!(
            Some(("None".to_string(), "None".to_string(), -0.044628)),
            parse_arrow_entry("(1) None --> None: -0.044628")
        );
        assert_eq!(
            Some((
                "type[-1]|type[0]=InitUpper|InitUpper".to_string(),
                "NELN".to_string(),
                0.039935
            )),
            parse_arrow_entry("(0) type[-1]|type[0]=InitUpper|InitUpper --> NELN: 0.039935")
        );
    }
}
