//! Compiled view metadata.

use std::collections::HashMap;

use super::parameter::Parameter;

/// Parameters and rewritten SQL of one compiled statement.
///
/// Parameters keep their registration order and are unique by id, compared
/// case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewMeta {
    parameters: Vec<Parameter>,
    index: HashMap<String, usize>,
    /// Rewritten SQL.
    pub source: String,
    /// The statement uses `#set`, `#if` or `#foreach`.
    pub templated: bool,
    /// Tables written by INSERT, UPDATE or DELETE.
    pub tables: Vec<String>,
}

impl ViewMeta {
    /// Creates an empty view for `source`.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Registers a parameter, merging it into an existing one with the same id.
    ///
    /// Returns the position of the parameter.
    pub fn add_parameter(&mut self, parameter: Parameter) -> usize {
        let key = parameter.id.to_lowercase();
        if let Some(&i) = self.index.get(&key) {
            self.parameters[i].merge(parameter);
            return i;
        }
        let i = self.parameters.len();
        self.index.insert(key, i);
        self.parameters.push(parameter);
        i
    }

    /// Looks up a parameter by id.
    #[must_use]
    pub fn parameter(&self, id: &str) -> Option<&Parameter> {
        self.index
            .get(&id.to_lowercase())
            .map(|&i| &self.parameters[i])
    }

    /// Looks up a parameter by id for modification.
    pub fn parameter_mut(&mut self, id: &str) -> Option<&mut Parameter> {
        let i = *self.index.get(&id.to_lowercase())?;
        self.parameters.get_mut(i)
    }

    /// Returns the parameters in registration order.
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Returns the parameters for modification, in registration order.
    pub fn parameters_mut(&mut self) -> impl Iterator<Item = &mut Parameter> {
        self.parameters.iter_mut()
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Returns true when no parameter is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::ParameterKind;

    #[test]
    fn test_dedup_by_id() {
        let mut view = ViewMeta::new("SELECT 1");
        assert_eq!(view.add_parameter(Parameter::new("Id").required(true)), 0);
        assert_eq!(view.add_parameter(Parameter::new("Name")), 1);
        assert_eq!(view.add_parameter(Parameter::new("id").repeated(true)), 0);

        assert_eq!(view.len(), 2);
        let id = view.parameter("ID").unwrap();
        assert_eq!(id.id, "Id");
        assert!(id.required && id.repeated);
    }

    #[test]
    fn test_parameter_mut() {
        let mut view = ViewMeta::default();
        view.add_parameter(Parameter::new("Id"));
        view.parameter_mut("id").unwrap().kind = ParameterKind::Path;
        assert_eq!(view.parameters()[0].kind, ParameterKind::Path);
        assert!(view.parameter_mut("missing").is_none());
    }
}
