//! Configuration files: `key = value` lines driving annotation and
//! application runs.

use std::io::BufRead;

use hashbrown::HashMap;

use crate::errors::Result;
use crate::feature::FeatureSet;
use crate::text::AnnotationScheme;

/// Parsed configuration of the annotate/apply pipelines.
///
/// Unknown keys with a true value are interpreted as feature group names,
/// so a configuration can enable extractor categories directly.
#[derive(Debug, Clone)]
pub struct CrfConfiguration {
    features: FeatureSet,
    annotation_scheme: AnnotationScheme,
    default_label: String,
    columns: HashMap<String, usize>,
    output_token: bool,
    running_text: bool,
    patterns_filename: String,
    left_context_filename: String,
    right_context_filename: String,
    regex_filename: String,
}

impl Default for CrfConfiguration {
    fn default() -> Self {
        Self {
            features: FeatureSet::default(),
            annotation_scheme: AnnotationScheme::Bio,
            default_label: "OTHER".to_string(),
            columns: HashMap::new(),
            output_token: false,
            running_text: false,
            patterns_filename: String::new(),
            left_context_filename: String::new(),
            right_context_filename: String::new(),
            regex_filename: String::new(),
        }
    }
}

impl CrfConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a configuration from a text stream. Empty lines and `#`
    /// comments are skipped.
    pub fn read<R>(&mut self, rdr: R) -> Result<()>
    where
        R: BufRead,
    {
        for line in rdr.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            match key {
                "Columns" => self.set_columns(value),
                "DefaultLabel" => self.default_label = value.to_string(),
                "Patterns" | "NamedEntities" => self.patterns_filename = value.to_string(),
                "LeftContextFilename" => self.left_context_filename = value.to_string(),
                "RightContextFilename" => self.right_context_filename = value.to_string(),
                "RegexFilename" => self.regex_filename = value.to_string(),
                "OutputToken" => self.output_token = true_bool_value(value),
                "RunningText" => self.running_text = true_bool_value(value),
                "AnnotationScheme" => match value.parse() {
                    Ok(scheme) => self.annotation_scheme = scheme,
                    Err(e) => eprintln!("CrfConfiguration: {e}"),
                },
                "ContextWindowSize" => match value.parse() {
                    Ok(n) if n > 0 => self.features.context_window = n,
                    _ => eprintln!("CrfConfiguration: invalid ContextWindowSize '{value}'"),
                },
                _ => {
                    if true_bool_value(value) {
                        self.features.enable_groups(key);
                    }
                }
            }
        }
        Ok(())
    }

    fn set_columns(&mut self, col_str: &str) {
        self.columns.clear();
        for (i, name) in col_str.split([';', '|']).enumerate() {
            self.columns.insert(name.trim().to_string(), i);
        }
    }

    /// The zero-based position of a named column, if configured.
    pub fn column_of(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }

    pub fn columns_count(&self) -> usize {
        self.columns.len()
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn features_mut(&mut self) -> &mut FeatureSet {
        &mut self.features
    }

    pub fn annotation_scheme(&self) -> AnnotationScheme {
        self.annotation_scheme
    }

    pub fn set_annotation_scheme(&mut self, scheme: AnnotationScheme) {
        self.annotation_scheme = scheme;
    }

    pub fn default_label(&self) -> &str {
        &self.default_label
    }

    pub fn output_token(&self) -> bool {
        self.output_token
    }

    pub fn set_output_token(&mut self, v: bool) {
        self.output_token = v;
    }

    pub fn input_is_running_text(&self) -> bool {
        self.running_text
    }

    pub fn set_running_text(&mut self, v: bool) {
        self.running_text = v;
    }

    pub fn patterns_filename(&self) -> &str {
        &self.patterns_filename
    }

    pub fn left_context_filename(&self) -> &str {
        &self.left_context_filename
    }

    pub fn right_context_filename(&self) -> &str {
        &self.right_context_filename
    }

    pub fn regex_filename(&self) -> &str {
        &self.regex_filename
    }
}

fn true_bool_value(v: &str) -> bool {
    match v {
        "yes" | "true" | "1" => true,
        "no" | "false" | "0" => false,
        _ => {
            eprintln!("CrfConfiguration: invalid value '{v}'");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_config() {
        let text = "\
# a comment
Columns = Token;Label;Tag
DefaultLabel = NONE
AnnotationScheme = bilou
ContextWindowSize = 6
RunningText = yes
AllWords = yes
AllPrefixes = true
Patterns = lists/ne.bin
";
        let mut config = CrfConfiguration::new();
        config.read(text.as_bytes()).unwrap();

        assert_eq!(Some(0), config.column_of("Token"));
        assert_eq!(Some(1), config.column_of("Label"));
        assert_eq!(Some(2), config.column_of("Tag"));
        assert_eq!(None, config.column_of("Lemma"));
        assert_eq!("NONE", config.default_label());
        assert_eq!(AnnotationScheme::Bilou, config.annotation_scheme());
        assert_eq!(6, config.features().context_window);
        assert!(config.input_is_running_text());
        assert!(config.features().word);
        assert!(config.features().prev_words);
        assert!(config.features().prefixes);
        assert!(!config.features().suffixes);
        assert_eq!("lists/ne.bin", config.patterns_filename());
    }
}
