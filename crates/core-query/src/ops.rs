//! Compiled program model: blocks, operations, conditions, and steps.
//!
//! A `Step` is the smallest parsed unit: one element address, variable
//! recall, or literal. Addresses support `Parent/Match` pairs, `@attribute`
//! components, `*` wildcards, a leading `:` namespace wildcard on either
//! component, and the `#`/`%`/`^` numeric derivations (count, length,
//! depth).

use crate::QueryError;

/// Exploration nesting levels, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Pattern,
    Division,
    Group,
    Branch,
    Block,
    Section,
    Subset,
    Unit,
}

impl Level {
    pub fn parse(flag: &str) -> Option<Self> {
        let name = flag.strip_prefix('-')?;
        Some(match name.to_ascii_lowercase().as_str() {
            "pattern" => Self::Pattern,
            "division" => Self::Division,
            "group" => Self::Group,
            "branch" => Self::Branch,
            "block" => Self::Block,
            "section" => Self::Section,
            "subset" => Self::Subset,
            "unit" => Self::Unit,
            _ => return None,
        })
    }
}

/// Position constraint on a block's matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    First,
    Last,
    Nth(usize),
}

impl Position {
    pub fn parse(value: &str) -> Result<Self, QueryError> {
        match value {
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            n => n
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .map(Self::Nth)
                .ok_or_else(|| QueryError::BadPosition(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Element content (possibly via `@attribute`).
    Element,
    /// `&NAME` variable recall.
    Variable,
    /// `#addr` match count.
    Count,
    /// `%addr` summed content length.
    Length,
    /// `^addr` depth of last hit.
    Depth,
    /// `*` subtree print; `match_name` holds the star run, `attribute` is
    /// "@" when attributes are suppressed.
    Star,
    /// `$` child element names.
    Dollar,
    /// Bare `@`: attribute names.
    AtSign,
    /// Literal right-hand side of a comparator.
    Literal,
}

/// One parsed element address or literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub kind: StepKind,
    /// Original token, kept for diagnostics.
    pub raw: String,
    /// Required parent name ("" = unconstrained).
    pub parent: String,
    /// Element name to match ("" with `Element` kind = current node).
    pub match_name: String,
    /// Attribute component after `@` ("" = element content).
    pub attribute: String,
    /// Leading `:` on the parent component.
    pub parent_wild_ns: bool,
    /// Leading `:` on the match component.
    pub match_wild_ns: bool,
}

impl Step {
    fn blank(kind: StepKind, raw: &str) -> Self {
        Self {
            kind,
            raw: raw.to_string(),
            parent: String::new(),
            match_name: String::new(),
            attribute: String::new(),
            parent_wild_ns: false,
            match_wild_ns: false,
        }
    }

    pub fn literal(text: &str) -> Self {
        Self::blank(StepKind::Literal, text)
    }

    /// Parse one address token.
    pub fn parse(token: &str) -> Result<Self, QueryError> {
        if token.is_empty() {
            return Err(QueryError::MissingOperand(String::new()));
        }
        if let Some(name) = token.strip_prefix('&') {
            if !is_variable_name(name) {
                return Err(QueryError::BadVariableName(name.to_string()));
            }
            let mut step = Self::blank(StepKind::Variable, token);
            step.match_name = name.to_string();
            return Ok(step);
        }
        let (kind, rest) = match token.as_bytes()[0] {
            b'#' => (StepKind::Count, &token[1..]),
            b'%' => (StepKind::Length, &token[1..]),
            b'^' => (StepKind::Depth, &token[1..]),
            _ => (StepKind::Element, token),
        };
        if kind == StepKind::Element {
            if token.chars().all(|c| c == '*') {
                let mut step = Self::blank(StepKind::Star, token);
                step.match_name = token.to_string();
                return Ok(step);
            }
            if let Some(stars) = token.strip_suffix('@') {
                if !stars.is_empty() && stars.chars().all(|c| c == '*') {
                    let mut step = Self::blank(StepKind::Star, token);
                    step.match_name = stars.to_string();
                    step.attribute = "@".to_string();
                    return Ok(step);
                }
            }
            if token == "$" {
                return Ok(Self::blank(StepKind::Dollar, token));
            }
            if token == "@" {
                return Ok(Self::blank(StepKind::AtSign, token));
            }
        }
        let mut step = Self::blank(kind, token);
        let mut addr = rest;
        if let Some((element, attribute)) = addr.rsplit_once('@') {
            step.attribute = attribute.to_string();
            addr = element;
        }
        if let Some((parent, name)) = addr.split_once('/') {
            let (wild, parent) = strip_ns_wildcard(parent);
            step.parent_wild_ns = wild;
            step.parent = parent.to_string();
            addr = name;
        }
        let (wild, name) = strip_ns_wildcard(addr);
        step.match_wild_ns = wild;
        step.match_name = name.to_string();
        Ok(step)
    }
}

fn strip_ns_wildcard(component: &str) -> (bool, &str) {
    match component.strip_prefix(':') {
        Some(rest) => (true, rest),
        None => (false, component),
    }
}

pub fn is_variable_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        && name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// A comma-separated element list sharing one emission group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub steps: Vec<Step>,
}

impl Clause {
    /// Parse one command argument into its comma members.
    pub fn parse(token: &str) -> Result<Self, QueryError> {
        let steps = token
            .split(',')
            .map(Step::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { steps })
    }
}

/// Value-producing and state-mutating command kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Element,
    First,
    Last,
    Num,
    Len,
    Depth,
    Index,
    Inc,
    Dec,
    Sum,
    Min,
    Max,
    Avg,
    Sub,
    Dev,
    Encode,
    Upper,
    Lower,
    Title,
    Terms,
    Words,
    Pairs,
    Letters,
    Indices,
    // Customization
    Pfx,
    Sfx,
    Sep,
    Tab,
    Ret,
    Lbl,
    Clr,
    Pfc,
    Rst,
    Def,
    /// `-NAME clause`: store the clause result under `value`.
    Variable,
}

impl OpKind {
    /// Extraction flag lookup; customization and variables are handled by
    /// the compiler directly.
    pub fn parse_extraction(flag: &str) -> Option<Self> {
        Some(match flag.to_ascii_lowercase().as_str() {
            "-element" => Self::Element,
            "-first" => Self::First,
            "-last" => Self::Last,
            "-num" | "-count" => Self::Num,
            "-len" | "-length" => Self::Len,
            "-depth" => Self::Depth,
            "-index" => Self::Index,
            "-inc" => Self::Inc,
            "-dec" => Self::Dec,
            "-sum" => Self::Sum,
            "-min" => Self::Min,
            "-max" => Self::Max,
            "-avg" => Self::Avg,
            "-sub" => Self::Sub,
            "-dev" => Self::Dev,
            "-encode" => Self::Encode,
            "-upper" => Self::Upper,
            "-lower" => Self::Lower,
            "-title" => Self::Title,
            "-terms" => Self::Terms,
            "-words" => Self::Words,
            "-pairs" => Self::Pairs,
            "-letters" => Self::Letters,
            "-indices" => Self::Indices,
            _ => return None,
        })
    }

    pub fn parse_customization(flag: &str) -> Option<Self> {
        Some(match flag.to_ascii_lowercase().as_str() {
            "-pfx" => Self::Pfx,
            "-sfx" => Self::Sfx,
            "-sep" => Self::Sep,
            "-tab" => Self::Tab,
            "-ret" => Self::Ret,
            "-lbl" => Self::Lbl,
            "-clr" => Self::Clr,
            "-pfc" => Self::Pfc,
            "-rst" => Self::Rst,
            "-def" => Self::Def,
            _ => return None,
        })
    }

    /// Customization kinds that take no operand.
    pub fn is_bare(self) -> bool {
        matches!(self, Self::Clr | Self::Rst)
    }
}

/// One compiled command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OpKind,
    /// Literal operand (PFX/SFX/SEP/TAB/RET/LBL/DEF text, or the variable
    /// name for `Variable`).
    pub value: String,
    pub clauses: Vec<Clause>,
}

impl Operation {
    pub fn bare(kind: OpKind) -> Self {
        Self {
            kind,
            value: String::new(),
            clauses: Vec::new(),
        }
    }

    pub fn with_value(kind: OpKind, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
            clauses: Vec::new(),
        }
    }
}

/// Condition clause openers and connectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondKind {
    /// `-if` / `-match`: open a Match clause.
    If,
    /// `-unless` / `-avoid`: open an Avoid clause.
    Unless,
    /// `-and`: another required term in the current clause.
    And,
    /// `-or`: an alternative term in the current clause.
    Or,
}

impl CondKind {
    pub fn parse(flag: &str) -> Option<Self> {
        Some(match flag.to_ascii_lowercase().as_str() {
            "-if" | "-match" => Self::If,
            "-unless" | "-avoid" => Self::Unless,
            "-and" => Self::And,
            "-or" => Self::Or,
            _ => return None,
        })
    }
}

/// String comparators fold case; numeric comparators parse signed integers
/// and fail closed on unparsable operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompKind {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    IsNot,
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl CompKind {
    pub fn parse(flag: &str) -> Option<Self> {
        Some(match flag.to_ascii_lowercase().as_str() {
            "-equals" => Self::Equals,
            "-contains" => Self::Contains,
            "-starts-with" => Self::StartsWith,
            "-ends-with" => Self::EndsWith,
            "-is-not" => Self::IsNot,
            "-gt" => Self::Gt,
            "-ge" => Self::Ge,
            "-lt" => Self::Lt,
            "-le" => Self::Le,
            "-eq" => Self::Eq,
            "-ne" => Self::Ne,
            _ => return None,
        })
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Gt | Self::Ge | Self::Lt | Self::Le | Self::Eq | Self::Ne
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub kind: CompKind,
    pub rhs: Step,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub kind: CondKind,
    pub step: Step,
    pub comparator: Option<Comparator>,
}

/// One exploration block, immutable after compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub level: Level,
    /// Raw visit path (`Match`, `Parent/Match`, `*`, `**/Match`, …).
    pub visit: String,
    pub parent: String,
    pub match_name: String,
    /// `**` in the parent component: re-enter matched subtrees.
    pub deep: bool,
    pub parent_wild_ns: bool,
    pub match_wild_ns: bool,
    pub position: Option<Position>,
    pub conditions: Vec<Condition>,
    pub commands: Vec<Operation>,
    pub failure: Vec<Operation>,
    pub children: Vec<Block>,
}

impl Block {
    pub fn new(level: Level, visit: &str) -> Self {
        let mut parent = String::new();
        let mut match_component = visit;
        let mut deep = false;
        let mut parent_wild_ns = false;
        if let Some((p, m)) = visit.split_once('/') {
            if p == "**" {
                deep = true;
            } else {
                let (wild, p) = strip_ns_wildcard(p);
                parent_wild_ns = wild;
                parent = p.to_string();
            }
            match_component = m;
        }
        let (match_wild_ns, match_name) = strip_ns_wildcard(match_component);
        let match_name = if match_name == "*" { String::new() } else { match_name.to_string() };
        let parent = if parent == "*" { String::new() } else { parent };
        Self {
            level,
            visit: visit.to_string(),
            parent,
            match_name,
            deep,
            parent_wild_ns,
            match_wild_ns,
            position: None,
            conditions: Vec::new(),
            commands: Vec::new(),
            failure: Vec::new(),
            children: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_parses_parent_match_attribute() {
        let s = Step::parse("MedlineCitation/PMID").unwrap();
        assert_eq!(s.parent, "MedlineCitation");
        assert_eq!(s.match_name, "PMID");
        assert_eq!(s.kind, StepKind::Element);

        let s = Step::parse("INSDQualifier_value@id").unwrap();
        assert_eq!(s.match_name, "INSDQualifier_value");
        assert_eq!(s.attribute, "id");

        let s = Step::parse("@accession").unwrap();
        assert_eq!(s.match_name, "");
        assert_eq!(s.attribute, "accession");
    }

    #[test]
    fn step_parses_derivations_and_specials() {
        assert_eq!(Step::parse("#Author").unwrap().kind, StepKind::Count);
        assert_eq!(Step::parse("%Title").unwrap().kind, StepKind::Length);
        assert_eq!(Step::parse("^PMID").unwrap().kind, StepKind::Depth);
        assert_eq!(Step::parse("&ACC").unwrap().kind, StepKind::Variable);
        assert_eq!(Step::parse("$").unwrap().kind, StepKind::Dollar);
        assert_eq!(Step::parse("@").unwrap().kind, StepKind::AtSign);
        let star = Step::parse("**@").unwrap();
        assert_eq!(star.kind, StepKind::Star);
        assert_eq!(star.match_name, "**");
        assert_eq!(star.attribute, "@");
    }

    #[test]
    fn step_namespace_wildcards() {
        let s = Step::parse(":mods/:title").unwrap();
        assert!(s.parent_wild_ns);
        assert!(s.match_wild_ns);
        assert_eq!(s.parent, "mods");
        assert_eq!(s.match_name, "title");
    }

    #[test]
    fn bad_variable_names_are_rejected() {
        assert!(Step::parse("&lower").is_err());
        assert!(Step::parse("&Mixed").is_err());
        assert!(Step::parse("&ACC2").is_ok());
    }

    #[test]
    fn clause_splits_on_commas() {
        let c = Clause::parse("Initials,LastName").unwrap();
        assert_eq!(c.steps.len(), 2);
        assert_eq!(c.steps[0].match_name, "Initials");
        assert_eq!(c.steps[1].match_name, "LastName");
    }

    #[test]
    fn block_visit_parsing() {
        let b = Block::new(Level::Block, "Author");
        assert_eq!(b.match_name, "Author");
        assert!(b.parent.is_empty() && !b.deep);

        let b = Block::new(Level::Group, "MedlineCitation/Article");
        assert_eq!(b.parent, "MedlineCitation");
        assert_eq!(b.match_name, "Article");

        let b = Block::new(Level::Block, "**/Keyword");
        assert!(b.deep);
        assert_eq!(b.match_name, "Keyword");

        let b = Block::new(Level::Block, "*");
        assert_eq!(b.match_name, "");
    }

    #[test]
    fn positions_parse() {
        assert_eq!(Position::parse("first").unwrap(), Position::First);
        assert_eq!(Position::parse("last").unwrap(), Position::Last);
        assert_eq!(Position::parse("3").unwrap(), Position::Nth(3));
        assert!(Position::parse("0").is_err());
        assert!(Position::parse("x").is_err());
    }
}
