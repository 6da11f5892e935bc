//! Type descriptors attached to union-find roots.
//!
//! A [`Descriptor`] is the concrete information the unifier stores at the root
//! of a variable's equivalence class: its [`Content`] and its [`Rank`]. Both
//! parts are optional because a `VariableSetDescriptor` event may update just
//! one of them; [`Descriptor::merge`] applies such a partial update.
//!
//! Content only ever *references* other variables. Resolving those references
//! is the job of the engine, at a particular position in the trace.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::variable::{Rank, Variable};

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// The descriptor stored at a union-find root.
///
/// A `None` field is "not known yet" when stored at a root, and "leave
/// unchanged" when carried by a `VariableSetDescriptor` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Descriptor {
    /// The type content, if any has been assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    /// The generalization rank, if any has been assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<Rank>,
}

impl Descriptor {
    /// A descriptor carrying only content.
    pub fn with_content(content: Content) -> Self {
        Self {
            content: Some(content),
            rank: None,
        }
    }

    /// A descriptor carrying both content and rank.
    pub fn new(content: Content, rank: Rank) -> Self {
        Self {
            content: Some(content),
            rank: Some(rank),
        }
    }

    /// Returns `true` if neither content nor rank is set.
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.rank.is_none()
    }

    /// Overwrite every field that `update` sets, keeping the rest.
    pub fn merge(&mut self, update: &Descriptor) {
        if let Some(content) = &update.content {
            self.content = Some(content.clone());
        }
        if let Some(rank) = update.rank {
            self.rank = Some(rank);
        }
    }

    /// Every variable referenced by this descriptor's content.
    pub fn variables(&self) -> Vec<Variable> {
        self.content
            .as_ref()
            .map(Content::variables)
            .unwrap_or_default()
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content {
            Some(content) => write!(f, "{content}")?,
            None => write!(f, "?")?,
        }
        if let Some(rank) = self.rank {
            write!(f, " @{rank}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// What the unifier knows about a type variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    /// An unconstrained, unifiable variable.
    Flex {
        #[serde(default)]
        name: Option<String>,
    },
    /// A named variable that may only unify with flex variables.
    Rigid { name: String },
    /// A flex variable bound by abilities.
    FlexAble {
        #[serde(default)]
        name: Option<String>,
        abilities: Vec<String>,
    },
    /// A rigid variable bound by abilities.
    RigidAble { name: String, abilities: Vec<String> },
    /// The variable closing a recursive type.
    Recursion {
        structure: Variable,
        #[serde(default)]
        name: Option<String>,
    },
    /// A lambda set: the set of closures a function value may be.
    LambdaSet {
        solved: Vec<Lambda>,
        #[serde(default)]
        recursion_var: Option<Variable>,
        #[serde(default)]
        unspecialized: Vec<Uls>,
        ambient_function: Variable,
    },
    /// A lambda set whose members were erased.
    ErasedLambda,
    /// Concrete structure.
    Structure { flat: FlatType },
    /// A named alias and the type it stands for.
    Alias {
        symbol: String,
        args: Vec<Variable>,
        real: Variable,
        kind: AliasKind,
    },
    /// A number literal constrained to a range of numeric types.
    RangedNumber { range: String },
    /// The variable's type could not be determined.
    Error,
}

impl Content {
    /// An anonymous flex variable.
    pub fn flex() -> Self {
        Content::Flex { name: None }
    }

    /// `symbol` applied to `args`, e.g. `List a`.
    pub fn apply(symbol: impl Into<String>, args: Vec<Variable>) -> Self {
        Content::Structure {
            flat: FlatType::Apply {
                symbol: symbol.into(),
                args,
            },
        }
    }

    /// Returns `true` for the variable-like contents (flex, rigid, able, recursion).
    pub fn is_variable_like(&self) -> bool {
        matches!(
            self,
            Content::Flex { .. }
                | Content::Rigid { .. }
                | Content::FlexAble { .. }
                | Content::RigidAble { .. }
                | Content::Recursion { .. }
        )
    }

    /// Every variable this content references, in declaration order.
    pub fn variables(&self) -> Vec<Variable> {
        let mut out = Vec::new();
        match self {
            Content::Flex { .. }
            | Content::Rigid { .. }
            | Content::FlexAble { .. }
            | Content::RigidAble { .. }
            | Content::ErasedLambda
            | Content::RangedNumber { .. }
            | Content::Error => {}
            Content::Recursion { structure, .. } => out.push(*structure),
            Content::LambdaSet {
                solved,
                recursion_var,
                unspecialized,
                ambient_function,
            } => {
                for lambda in solved {
                    out.extend(lambda.captures.iter().copied());
                }
                out.extend(recursion_var.iter().copied());
                out.extend(unspecialized.iter().map(|u| u.var));
                out.push(*ambient_function);
            }
            Content::Structure { flat } => flat.collect_variables(&mut out),
            Content::Alias { args, real, .. } => {
                out.extend(args.iter().copied());
                out.push(*real);
            }
        }
        out
    }
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Flex { name: Some(name) } => write!(f, "{name}"),
            Content::Flex { name: None } => write!(f, "*"),
            Content::Rigid { name } => write!(f, "'{name}"),
            Content::FlexAble { name, abilities } => {
                write!(f, "{} implements {}", name.as_deref().unwrap_or("*"), abilities.join(" & "))
            }
            Content::RigidAble { name, abilities } => {
                write!(f, "'{name} implements {}", abilities.join(" & "))
            }
            Content::Recursion { structure, .. } => write!(f, "<rec {structure}>"),
            Content::LambdaSet { solved, .. } => {
                let names: Vec<&str> = solved.iter().map(|l| l.symbol.as_str()).collect();
                write!(f, "[{}]", names.join(", "))
            }
            Content::ErasedLambda => write!(f, "<erased>"),
            Content::Structure { flat } => write!(f, "{flat}"),
            Content::Alias { symbol, args, .. } => write_applied(f, symbol, args),
            Content::RangedNumber { range } => write!(f, "Num<{range}>"),
            Content::Error => write!(f, "<error>"),
        }
    }
}

fn write_applied(f: &mut fmt::Formatter<'_>, head: &str, args: &[Variable]) -> fmt::Result {
    write!(f, "{head}")?;
    for arg in args {
        write!(f, " {arg}")?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Lambda sets
// ---------------------------------------------------------------------------

/// One solved member of a lambda set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lambda {
    /// The closure's symbol.
    pub symbol: String,
    /// Variables of the captured environment.
    #[serde(default)]
    pub captures: Vec<Variable>,
}

/// An unspecialized lambda set member: `var:member:region`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uls {
    pub var: Variable,
    pub member: String,
    pub region: u8,
}

// ---------------------------------------------------------------------------
// AliasKind
// ---------------------------------------------------------------------------

/// Whether an alias is transparent or opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasKind {
    Structural,
    Opaque,
}

// ---------------------------------------------------------------------------
// FlatType
// ---------------------------------------------------------------------------

/// A concrete, one-level type structure whose children are variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum FlatType {
    Apply {
        symbol: String,
        args: Vec<Variable>,
    },
    Func {
        args: Vec<Variable>,
        closure: Variable,
        ret: Variable,
    },
    Record {
        fields: Vec<RecordField>,
        ext: Variable,
    },
    Tuple {
        elems: Vec<Variable>,
        ext: Variable,
    },
    TagUnion {
        tags: Vec<Tag>,
        ext: Variable,
    },
    EmptyRecord,
    EmptyTagUnion,
}

impl FlatType {
    fn collect_variables(&self, out: &mut Vec<Variable>) {
        match self {
            FlatType::Apply { args, .. } => out.extend(args.iter().copied()),
            FlatType::Func { args, closure, ret } => {
                out.extend(args.iter().copied());
                out.push(*closure);
                out.push(*ret);
            }
            FlatType::Record { fields, ext } => {
                out.extend(fields.iter().map(|field| field.var));
                out.push(*ext);
            }
            FlatType::Tuple { elems, ext } => {
                out.extend(elems.iter().copied());
                out.push(*ext);
            }
            FlatType::TagUnion { tags, ext } => {
                for tag in tags {
                    out.extend(tag.payload.iter().copied());
                }
                out.push(*ext);
            }
            FlatType::EmptyRecord | FlatType::EmptyTagUnion => {}
        }
    }
}

impl fmt::Display for FlatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlatType::Apply { symbol, args } => write_applied(f, symbol, args),
            FlatType::Func { args, closure, ret } => {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "{} -{closure}-> {ret}", args.join(", "))
            }
            FlatType::Record { fields, ext } => {
                let fields: Vec<String> = fields.iter().map(ToString::to_string).collect();
                write!(f, "{{ {} }}{ext}", fields.join(", "))
            }
            FlatType::Tuple { elems, ext } => {
                let elems: Vec<String> = elems.iter().map(ToString::to_string).collect();
                write!(f, "( {} ){ext}", elems.join(", "))
            }
            FlatType::TagUnion { tags, ext } => {
                let tags: Vec<String> = tags.iter().map(ToString::to_string).collect();
                write!(f, "[{}]{ext}", tags.join(", "))
            }
            FlatType::EmptyRecord => write!(f, "{{}}"),
            FlatType::EmptyTagUnion => write!(f, "[]"),
        }
    }
}

/// A record field and how it must be supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordField {
    pub name: String,
    #[serde(default)]
    pub kind: RecordFieldKind,
    pub var: Variable,
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = match self.kind {
            RecordFieldKind::Required | RecordFieldKind::Demanded => ":",
            RecordFieldKind::Optional => "?",
        };
        write!(f, "{} {sep} {}", self.name, self.var)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFieldKind {
    #[default]
    Required,
    Optional,
    Demanded,
}

/// A tag and its payload variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub payload: Vec<Variable>,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_applied(f, &self.name, &self.payload)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
