//! Dotted paths into the execution context
//!
//! A path is a root followed by dot-separated segments:
//! - `status.states.LAI` - field access
//! - `status.soil.layers[2].theta` - indexed access
//! - `status.history.rain.sum()` - computed access
//!
//! Roots are `status` (the run's shared record), `driving` (caller-supplied
//! driving variables), `parameters` (caller-supplied parameters) and `time`
//! (the run's calendar bounds).
//!
//! Paths are compiled once, when a workflow definition is built, and walked
//! against a live context every time a value is needed. Walking never fails:
//! an absent or null intermediate makes the whole path unavailable.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static SEGMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)((?:\[\d+\])*)(\(\))?$").unwrap()
});

static INDEX_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(\d+)\]").unwrap());

static IDENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Errors raised while compiling a path
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("Empty path")]
    Empty,

    #[error("Unknown root '{root}' in path '{path}' (expected status, driving, parameters or time)")]
    UnknownRoot { root: String, path: String },

    #[error("Invalid segment '{segment}' in path '{path}'")]
    InvalidSegment { segment: String, path: String },

    #[error("Unknown accessor '{name}()' in path '{path}'")]
    UnknownAccessor { name: String, path: String },

    #[error("Path '{0}' is not a plain field path")]
    NotAFieldPath(String),
}

/// Where a path starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathRoot {
    Status,
    Driving,
    Parameters,
    Time,
}

impl PathRoot {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "status" => Some(PathRoot::Status),
            "driving" => Some(PathRoot::Driving),
            "parameters" => Some(PathRoot::Parameters),
            "time" => Some(PathRoot::Time),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PathRoot::Status => "status",
            PathRoot::Driving => "driving",
            PathRoot::Parameters => "parameters",
            PathRoot::Time => "time",
        }
    }
}

/// Computed accessors usable as `name()` segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accessor {
    Len,
    Sum,
    Min,
    Max,
    Mean,
    First,
    Last,
    Doy,
    Year,
}

impl Accessor {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "len" => Some(Accessor::Len),
            "sum" => Some(Accessor::Sum),
            "min" => Some(Accessor::Min),
            "max" => Some(Accessor::Max),
            "mean" => Some(Accessor::Mean),
            "first" => Some(Accessor::First),
            "last" => Some(Accessor::Last),
            "doy" => Some(Accessor::Doy),
            "year" => Some(Accessor::Year),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Accessor::Len => "len",
            Accessor::Sum => "sum",
            Accessor::Min => "min",
            Accessor::Max => "max",
            Accessor::Mean => "mean",
            Accessor::First => "first",
            Accessor::Last => "last",
            Accessor::Doy => "doy",
            Accessor::Year => "year",
        }
    }

    /// Apply the accessor. `None` when the value has the wrong shape.
    pub fn apply(&self, value: &Value) -> Option<Value> {
        match self {
            Accessor::Len => match value {
                Value::Array(items) => Some(Value::from(items.len())),
                Value::Object(map) => Some(Value::from(map.len())),
                Value::String(s) => Some(Value::from(s.chars().count())),
                _ => None,
            },
            Accessor::Sum => numbers(value).map(|xs| Value::from(xs.iter().sum::<f64>())),
            Accessor::Min => numbers(value)?
                .into_iter()
                .reduce(f64::min)
                .map(Value::from),
            Accessor::Max => numbers(value)?
                .into_iter()
                .reduce(f64::max)
                .map(Value::from),
            Accessor::Mean => {
                let xs = numbers(value)?;
                if xs.is_empty() {
                    return None;
                }
                Some(Value::from(xs.iter().sum::<f64>() / xs.len() as f64))
            }
            Accessor::First => value.as_array()?.first().cloned(),
            Accessor::Last => value.as_array()?.last().cloned(),
            Accessor::Doy => date(value).map(|d| Value::from(d.ordinal())),
            Accessor::Year => date(value).map(|d| Value::from(d.year())),
        }
        .filter(|v| !v.is_null())
    }
}

fn numbers(value: &Value) -> Option<Vec<f64>> {
    value.as_array()?.iter().map(Value::as_f64).collect()
}

fn date(value: &Value) -> Option<NaiveDate> {
    value.as_str()?.parse().ok()
}

/// One step of a path walk
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Field(String),
    Index(usize),
    Call(Accessor),
}

/// A compiled, rooted path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextPath {
    root: PathRoot,
    segments: Vec<Segment>,
}

impl ContextPath {
    pub fn new(root: PathRoot, segments: Vec<Segment>) -> Self {
        Self { root, segments }
    }

    /// Parse a rooted path such as `status.states.LAI`
    pub fn parse(input: &str) -> Result<Self, PathError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(PathError::Empty);
        }

        let (root_name, rest) = match input.split_once('.') {
            Some((root, rest)) => (root, Some(rest)),
            None => (input, None),
        };

        let root = PathRoot::from_name(root_name).ok_or_else(|| PathError::UnknownRoot {
            root: root_name.to_string(),
            path: input.to_string(),
        })?;

        let segments = match rest {
            Some(rest) => parse_segments(rest, input)?,
            None => Vec::new(),
        };

        Ok(Self { root, segments })
    }

    pub fn root(&self) -> PathRoot {
        self.root
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Field names when every segment is a plain field access
    pub fn field_names(&self) -> Option<Vec<&str>> {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Field(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl FromStr for ContextPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ContextPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root.name())?;
        for segment in &self.segments {
            match segment {
                Segment::Field(name) => write!(f, ".{}", name)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
                Segment::Call(accessor) => write!(f, ".{}()", accessor.name())?,
            }
        }
        Ok(())
    }
}

fn parse_segments(rest: &str, path: &str) -> Result<Vec<Segment>, PathError> {
    let mut segments = Vec::new();

    for raw in rest.split('.') {
        let invalid = || PathError::InvalidSegment {
            segment: raw.to_string(),
            path: path.to_string(),
        };

        let caps = SEGMENT_REGEX.captures(raw).ok_or_else(invalid)?;
        let name = &caps[1];
        let indexes = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let is_call = caps.get(3).is_some();

        if is_call {
            if !indexes.is_empty() {
                return Err(invalid());
            }
            let accessor = Accessor::from_name(name).ok_or_else(|| PathError::UnknownAccessor {
                name: name.to_string(),
                path: path.to_string(),
            })?;
            segments.push(Segment::Call(accessor));
            continue;
        }

        segments.push(Segment::Field(name.to_string()));
        for cap in INDEX_REGEX.captures_iter(indexes) {
            let index = cap[1].parse::<usize>().map_err(|_| invalid())?;
            segments.push(Segment::Index(index));
        }
    }

    Ok(segments)
}

/// Split a writable dotted field path (`waterbalance.states.SM`) into names.
///
/// A leading `status.` is accepted and dropped.
pub fn parse_field_path(input: &str) -> Result<Vec<String>, PathError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PathError::Empty);
    }

    let mut names: Vec<&str> = input.split('.').collect();
    if names.len() > 1 && names[0] == PathRoot::Status.name() {
        names.remove(0);
    }

    if names.iter().all(|name| IDENT_REGEX.is_match(name)) {
        Ok(names.into_iter().map(str::to_string).collect())
    } else {
        Err(PathError::NotAFieldPath(input.to_string()))
    }
}

/// Walk `segments` starting from `start`.
///
/// Returns `None` as soon as a segment is missing or a value is null.
pub fn walk(start: &Value, segments: &[Segment]) -> Option<Value> {
    let mut current: Cow<'_, Value> = Cow::Borrowed(start);

    for segment in segments {
        if current.is_null() {
            return None;
        }
        current = match segment {
            Segment::Field(name) => descend(current, |v| v.as_object()?.get(name.as_str()))?,
            Segment::Index(index) => descend(current, |v| v.as_array()?.get(*index))?,
            Segment::Call(accessor) => Cow::Owned(accessor.apply(&current)?),
        };
    }

    if current.is_null() {
        None
    } else {
        Some(current.into_owned())
    }
}

fn descend<'a>(
    current: Cow<'a, Value>,
    pick: impl Fn(&Value) -> Option<&Value>,
) -> Option<Cow<'a, Value>> {
    match current {
        Cow::Borrowed(value) => pick(value).map(Cow::Borrowed),
        Cow::Owned(value) => pick(&value).cloned().map(Cow::Owned),
    }
}
