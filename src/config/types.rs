//! Core configuration types
//!
//! This module defines the data structures that represent a build.yml file.

use crate::runner::{Condition, Step};
use serde::Deserialize;
use serde_yaml::Value;

/// Top-level build file structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildFile {
    /// Project name
    #[serde(default)]
    pub name: Option<String>,

    /// Target to run when none is requested
    #[serde(default)]
    pub default: Option<String>,

    /// Prefix under which environment variables become properties
    #[serde(default)]
    pub environment: Option<String>,

    /// Dotenv-style property files, relative to the build file
    #[serde(rename = "property-files", default)]
    pub property_files: Vec<String>,

    /// Project properties, in declaration order
    #[serde(default, deserialize_with = "deserialize_properties")]
    pub properties: Vec<(String, String)>,

    /// Named predicates usable from guards
    #[serde(default, deserialize_with = "deserialize_named")]
    pub predicates: Vec<(String, PredicateConfig)>,

    /// Targets, in declaration order
    #[serde(default, deserialize_with = "deserialize_named")]
    pub targets: Vec<(String, TargetConfig)>,
}

impl BuildFile {
    pub fn target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn predicate(&self, id: &str) -> Option<&PredicateConfig> {
        self.predicates.iter().find(|(n, _)| n == id).map(|(_, p)| p)
    }
}

/// A target definition
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Dependencies as a list or a comma-separated string
    #[serde(default)]
    pub depends: Option<Depends>,

    #[serde(default)]
    pub description: Option<String>,

    /// Run only if this property is defined
    #[serde(rename = "if", default)]
    pub if_set: Option<String>,

    /// Run only if this property is not defined
    #[serde(default)]
    pub unless: Option<String>,

    #[serde(default)]
    pub guard: Option<ConditionConfig>,

    #[serde(default, deserialize_with = "deserialize_steps")]
    pub steps: Vec<StepConfig>,
}

impl TargetConfig {
    /// Combined guard from `if`, `unless` and `guard`
    pub fn condition(&self) -> Option<Condition> {
        let mut parts = Vec::new();
        if let Some(property) = &self.if_set {
            parts.push(Condition::available(property.clone()));
        }
        if let Some(property) = &self.unless {
            parts.push(Condition::available(property.clone()).negate());
        }
        if let Some(guard) = &self.guard {
            parts.push(guard.to_condition());
        }

        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Condition::And(parts)),
        }
    }
}

/// Raw `depends` value
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Depends {
    List(Vec<String>),
    Text(String),
}

/// A step - a command string, a detailed command, or a property assignment
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StepConfig {
    Simple(String),
    Property { property: PropertyStep },
    Command(CommandDetail),
}

impl StepConfig {
    pub fn to_step(&self) -> Step {
        match self {
            StepConfig::Simple(exec) => Step::command(exec.clone()),
            StepConfig::Property { property } => {
                Step::set_property(property.name.clone(), property.value.clone())
            }
            StepConfig::Command(detail) => Step::Command {
                exec: detail.exec.clone(),
                print: detail.print.clone(),
                quiet: detail.quiet,
                dir: detail.dir.clone(),
            },
        }
    }
}

/// Detailed command specification
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandDetail {
    /// The command to execute
    pub exec: String,

    /// What to print when running (defaults to exec)
    #[serde(default)]
    pub print: Option<String>,

    /// Whether to skip echoing the command
    #[serde(default)]
    pub quiet: bool,

    /// Working directory relative to the build file
    #[serde(default)]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyStep {
    pub name: String,
    #[serde(deserialize_with = "deserialize_scalar")]
    pub value: String,
}

/// Guard expression as written in YAML, a mapping with a single key
/// such as `{ not: { isset: skip } }`
#[derive(Debug, Clone)]
pub enum ConditionConfig {
    Equals(EqualsConfig),
    Not(Box<ConditionConfig>),
    And(Vec<ConditionConfig>),
    Or(Vec<ConditionConfig>),
    Xor(Vec<ConditionConfig>),
    IsTrue(String),
    /// Property is defined
    IsSet(String),
    /// Named predicate from the `predicates` section
    Predicate(String),
}

impl<'de> Deserialize<'de> for ConditionConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        ConditionConfig::from_value(Value::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}

impl ConditionConfig {
    fn from_value(value: Value) -> Result<Self, String> {
        let entry = match value {
            Value::Mapping(map) if map.len() == 1 => map.into_iter().next(),
            _ => None,
        };
        let Some((Value::String(kind), body)) = entry else {
            return Err("a condition must be a mapping with exactly one key".to_string());
        };

        let text = |body: Value| {
            scalar_to_string(body).ok_or_else(|| format!("'{}' expects a string", kind))
        };
        let children = |body: Value| -> Result<Vec<ConditionConfig>, String> {
            match body {
                Value::Sequence(items) => {
                    items.into_iter().map(ConditionConfig::from_value).collect()
                }
                Value::Null => Ok(Vec::new()),
                _ => Err(format!("'{}' expects a list of conditions", kind)),
            }
        };

        match kind.as_str() {
            "equals" => EqualsConfig::deserialize(body)
                .map(ConditionConfig::Equals)
                .map_err(|e| format!("in 'equals': {}", e)),
            "not" => Ok(ConditionConfig::Not(Box::new(ConditionConfig::from_value(body)?))),
            "and" => children(body).map(ConditionConfig::And),
            "or" => children(body).map(ConditionConfig::Or),
            "xor" => children(body).map(ConditionConfig::Xor),
            "istrue" => text(body).map(ConditionConfig::IsTrue),
            "isset" => text(body).map(ConditionConfig::IsSet),
            "predicate" => text(body).map(ConditionConfig::Predicate),
            other => Err(format!("unknown condition '{}'", other)),
        }
    }

    pub fn to_condition(&self) -> Condition {
        let all = |children: &[ConditionConfig]| -> Vec<Condition> {
            children.iter().map(ConditionConfig::to_condition).collect()
        };

        match self {
            ConditionConfig::Equals(eq) => Condition::Equals {
                left: eq.left.clone(),
                right: eq.right.clone(),
                case_sensitive: eq.casesensitive,
                trim: eq.trim,
            },
            ConditionConfig::Not(inner) => inner.to_condition().negate(),
            ConditionConfig::And(children) => Condition::And(all(children)),
            ConditionConfig::Or(children) => Condition::Or(all(children)),
            ConditionConfig::Xor(children) => Condition::Xor(all(children)),
            ConditionConfig::IsTrue(value) => Condition::is_true(value.clone()),
            ConditionConfig::IsSet(property) => Condition::available(property.clone()),
            ConditionConfig::Predicate(id) => Condition::external(id.clone()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EqualsConfig {
    #[serde(deserialize_with = "deserialize_scalar")]
    pub left: String,
    #[serde(deserialize_with = "deserialize_scalar")]
    pub right: String,
    #[serde(default = "default_true")]
    pub casesensitive: bool,
    #[serde(default)]
    pub trim: bool,
}

/// A named predicate; exactly one check must be set
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredicateConfig {
    /// Succeeds when the command exits with status 0
    #[serde(default)]
    pub command: Option<String>,

    /// Succeeds when the glob pattern matches an existing path
    #[serde(default)]
    pub exists: Option<String>,

    /// Succeeds when the environment variable is set
    #[serde(rename = "env-set", default)]
    pub env_set: Option<String>,

    /// Succeeds when the string matches the regular expression
    #[serde(default)]
    pub matches: Option<MatchesConfig>,
}

impl PredicateConfig {
    /// Number of checks defined
    pub fn check_count(&self) -> usize {
        [
            self.command.is_some(),
            self.exists.is_some(),
            self.env_set.is_some(),
            self.matches.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchesConfig {
    pub string: String,
    pub pattern: String,
    #[serde(default = "default_true")]
    pub casesensitive: bool,
}

fn default_true() -> bool {
    true
}

/// Render a YAML scalar as a property string
fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

fn deserialize_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    scalar_to_string(Value::deserialize(deserializer)?)
        .ok_or_else(|| D::Error::custom("expected a string, number or boolean"))
}

/// Property mapping with scalar values, keeping declaration order
fn deserialize_properties<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Mapping(map) => map
            .into_iter()
            .map(|(key, value)| {
                let key = scalar_to_string(key)
                    .ok_or_else(|| D::Error::custom("property names must be strings"))?;
                let value = scalar_to_string(value).ok_or_else(|| {
                    D::Error::custom(format!("property '{}' must have a scalar value", key))
                })?;
                Ok((key, value))
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("properties must be a mapping")),
    }
}

/// Mapping of name to definition, keeping declaration order
fn deserialize_named<'de, D, T>(deserializer: D) -> Result<Vec<(String, T)>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned + Default,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Mapping(map) => map
            .into_iter()
            .map(|(key, value)| {
                let name = match key {
                    Value::String(name) => name,
                    other => scalar_to_string(other)
                        .ok_or_else(|| D::Error::custom("names must be strings"))?,
                };
                // `name:` with no body is an empty definition
                let definition = match value {
                    Value::Null => T::default(),
                    value => T::deserialize(value)
                        .map_err(|e| D::Error::custom(format!("in '{}': {}", name, e)))?,
                };
                Ok((name, definition))
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("expected a mapping of names")),
    }
}

/// Steps as a single string or a list
fn deserialize_steps<'de, D>(deserializer: D) -> Result<Vec<StepConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;

    match value {
        // Single string command
        Value::String(s) => Ok(vec![StepConfig::Simple(s)]),
        Value::Mapping(_) => {
            let step = StepConfig::deserialize(value).map_err(D::Error::custom)?;
            Ok(vec![step])
        }
        Value::Sequence(seq) => {
            let mut steps = Vec::new();
            for item in seq {
                let step = StepConfig::deserialize(item).map_err(D::Error::custom)?;
                steps.push(step);
            }
            Ok(steps)
        }
        Value::Null => Ok(Vec::new()),
        _ => Err(D::Error::custom("steps must be a string, object, or array")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_simple_build_file() {
        let yaml = r#"
name: demo
default: hello
targets:
  hello:
    description: Say hello
    steps: echo "hello"
"#;
        let file: BuildFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.name.as_deref(), Some("demo"));
        assert_eq!(file.targets.len(), 1);
        let hello = file.target("hello").unwrap();
        assert_eq!(hello.description.as_deref(), Some("Say hello"));
        assert!(matches!(&hello.steps[..], [StepConfig::Simple(cmd)] if cmd == "echo \"hello\""));
    }

    #[test]
    fn test_targets_keep_declaration_order() {
        let yaml = r#"
targets:
  zeta: {}
  alpha:
  mid: { steps: [] }
"#;
        let file: BuildFile = serde_yaml::from_str(yaml).unwrap();
        let names: Vec<&str> = file.targets.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_step_forms() {
        let yaml = r#"
targets:
  build:
    steps:
      - echo plain
      - { exec: make, dir: src, quiet: true, print: "making" }
      - property: { name: built, value: true }
"#;
        let file: BuildFile = serde_yaml::from_str(yaml).unwrap();
        let steps: Vec<Step> = file
            .target("build")
            .unwrap()
            .steps
            .iter()
            .map(StepConfig::to_step)
            .collect();
        assert_eq!(steps[0], Step::command("echo plain"));
        assert_eq!(
            steps[1],
            Step::Command {
                exec: "make".to_string(),
                print: Some("making".to_string()),
                quiet: true,
                dir: Some("src".to_string()),
            }
        );
        assert_eq!(steps[2], Step::set_property("built", "true"));
    }

    #[test]
    fn test_depends_forms() {
        let yaml = r#"
targets:
  a: { depends: [x, y] }
  b: { depends: "x, y" }
"#;
        let file: BuildFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            file.target("a").unwrap().depends,
            Some(Depends::List(vec!["x".into(), "y".into()]))
        );
        assert_eq!(
            file.target("b").unwrap().depends,
            Some(Depends::Text("x, y".into()))
        );
    }

    #[test]
    fn test_condition_syntax() {
        let yaml = r#"
and:
  - not: { istrue: "${skip}" }
  - equals: { left: "${mode}", right: Release, casesensitive: false }
  - or: [ { isset: version }, { predicate: has-git } ]
  - xor: []
"#;
        let cond: ConditionConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            cond.to_condition(),
            Condition::And(vec![
                Condition::is_true("${skip}").negate(),
                Condition::Equals {
                    left: "${mode}".into(),
                    right: "Release".into(),
                    case_sensitive: false,
                    trim: false,
                },
                Condition::Or(vec![
                    Condition::available("version"),
                    Condition::external("has-git"),
                ]),
                Condition::Xor(vec![]),
            ])
        );
    }

    #[test]
    fn test_if_unless_guard_combined() {
        let yaml = r#"
if: version
unless: skip
guard: { predicate: ready }
"#;
        let target: TargetConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            target.condition(),
            Some(Condition::And(vec![
                Condition::available("version"),
                Condition::available("skip").negate(),
                Condition::external("ready"),
            ]))
        );

        let only_if: TargetConfig = serde_yaml::from_str("if: version").unwrap();
        assert_eq!(only_if.condition(), Some(Condition::available("version")));
        assert_eq!(TargetConfig::default().condition(), None);
    }

    #[test]
    fn test_guard_inside_build_file() {
        let yaml = r#"
targets:
  build:
    guard: { not: { istrue: "${skip}" } }
    steps: echo building
  release:
    guard:
      and:
        - isset: version
        - predicate: has-git
"#;
        let file: BuildFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            file.target("build").unwrap().condition(),
            Some(Condition::is_true("${skip}").negate())
        );
        assert_eq!(
            file.target("release").unwrap().condition(),
            Some(Condition::And(vec![
                Condition::available("version"),
                Condition::external("has-git"),
            ]))
        );
    }

    #[test]
    fn test_bad_condition_rejected() {
        for guard in [
            "{ maybe: x }",
            "{ not: { isset: a }, and: [] }",
            "istrue",
            "{ and: { isset: a } }",
        ] {
            let yaml = format!("targets:\n  t: {{ guard: {} }}\n", guard);
            assert!(serde_yaml::from_str::<BuildFile>(&yaml).is_err(), "{}", guard);
        }
    }

    #[test]
    fn test_scalar_properties() {
        let yaml = r#"
properties:
  version: 1.2
  debug: false
  out: "target/${name}"
"#;
        let file: BuildFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            file.properties,
            vec![
                ("version".to_string(), "1.2".to_string()),
                ("debug".to_string(), "false".to_string()),
                ("out".to_string(), "target/${name}".to_string()),
            ]
        );
    }

    #[test]
    fn test_predicate_check_count() {
        let yaml = r#"
predicates:
  one: { command: "true" }
  two: { command: "true", exists: "*.txt" }
"#;
        let file: BuildFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.predicate("one").unwrap().check_count(), 1);
        assert_eq!(file.predicate("two").unwrap().check_count(), 2);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let yaml = r#"
targets:
  build: { stepz: [] }
"#;
        assert!(serde_yaml::from_str::<BuildFile>(yaml).is_err());
    }
}
