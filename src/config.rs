pub const DEFAULT_SEPARATOR: char = '|';

/// Fixed delimiter between start and end of a chapter line.
pub const TIME_DELIMITER: char = '|';

/// Settings shared by the reconciler, the metadata codec and the exporter.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Separates chapter names (and header keys) from their values.
    pub separator: char,
    /// Characters stripped from generated file and folder names.
    pub banned_characters: Vec<char>,
    /// Prefix chapter names with the name of the part they belong to.
    pub prepend_part_names: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
            banned_characters: vec!['/'],
            prepend_part_names: true,
        }
    }
}

impl Config {
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn is_banned(&self, c: char) -> bool {
        self.banned_characters.contains(&c)
    }
}
