//! Call arguments as seen by built-in functions

use super::value::Value;
use super::ScriptError;

#[derive(Debug)]
pub struct Args {
    name: &'static str,
    positional: Vec<Value>,
    keyword: Vec<(String, Value)>,
}

impl Args {
    pub fn new(name: &'static str, positional: Vec<Value>, keyword: Vec<(String, Value)>) -> Self {
        Self {
            name,
            positional,
            keyword,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keyword(&self, key: &str) -> Option<&Value> {
        self.keyword
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    /// Positional argument `index`, or the keyword `key`
    pub fn get(&self, index: usize, key: &str) -> Option<&Value> {
        self.positional.get(index).or_else(|| self.keyword(key))
    }

    /// First keyword present among the aliases
    pub fn any_keyword(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().find_map(|key| self.keyword(key))
    }

    pub fn require(&self, index: usize, key: &str) -> Result<&Value, ScriptError> {
        self.get(index, key).ok_or_else(|| {
            ScriptError::Type(format!(
                "{}() missing required argument: '{key}'",
                self.name
            ))
        })
    }

    pub fn max_positional(&self, max: usize) -> Result<(), ScriptError> {
        if self.positional.len() > max {
            return Err(ScriptError::Type(format!(
                "{}() takes at most {max} positional arguments but {} were given",
                self.name,
                self.positional.len()
            )));
        }
        Ok(())
    }

    pub fn allow_keywords(&self, allowed: &[&str]) -> Result<(), ScriptError> {
        match self
            .keyword
            .iter()
            .find(|(name, _)| !allowed.contains(&name.as_str()))
        {
            Some((name, _)) => Err(ScriptError::Type(format!(
                "{}() got an unexpected keyword argument '{name}'",
                self.name
            ))),
            None => Ok(()),
        }
    }

    /// Optional text argument, rendered the way `str()` would
    pub fn text(&self, index: usize, key: &str) -> Option<String> {
        match self.get(index, key) {
            None | Some(Value::None) => None,
            Some(value) => Some(value.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args::new(
            "linspace",
            vec![Value::Number(0.0), Value::Number(1.0)],
            vec![("num".to_string(), Value::Number(5.0))],
        )
    }

    #[test]
    fn test_positional_then_keyword() {
        let args = args();
        assert!(matches!(args.get(1, "stop"), Some(Value::Number(n)) if *n == 1.0));
        assert!(matches!(args.get(2, "num"), Some(Value::Number(n)) if *n == 5.0));
        assert!(args.get(3, "endpoint").is_none());
    }

    #[test]
    fn test_validation_messages() {
        let args = args();
        let err = args.require(3, "endpoint").unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: linspace() missing required argument: 'endpoint'"
        );
        assert!(args.max_positional(1).is_err());
        assert!(args.allow_keywords(&["num"]).is_ok());
        assert!(args.allow_keywords(&["endpoint"]).is_err());
    }
}
