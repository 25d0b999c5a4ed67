//! Diagram dialects understood by the rendering engine

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A Mermaid diagram dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagramKind {
    Flowchart,
    Sequence,
    Class,
    State,
    EntityRelationship,
    Gantt,
    Journey,
    Mindmap,
    Pie,
    GitGraph,
}

impl DiagramKind {
    /// Every supported dialect
    pub const ALL: [DiagramKind; 10] = [
        DiagramKind::Flowchart,
        DiagramKind::Sequence,
        DiagramKind::Class,
        DiagramKind::State,
        DiagramKind::EntityRelationship,
        DiagramKind::Gantt,
        DiagramKind::Journey,
        DiagramKind::Mindmap,
        DiagramKind::Pie,
        DiagramKind::GitGraph,
    ];

    /// Short machine name
    pub fn name(&self) -> &'static str {
        match self {
            DiagramKind::Flowchart => "flowchart",
            DiagramKind::Sequence => "sequence",
            DiagramKind::Class => "class",
            DiagramKind::State => "state",
            DiagramKind::EntityRelationship => "er",
            DiagramKind::Gantt => "gantt",
            DiagramKind::Journey => "journey",
            DiagramKind::Mindmap => "mindmap",
            DiagramKind::Pie => "pie",
            DiagramKind::GitGraph => "gitgraph",
        }
    }

    /// Header keyword that opens a source of this dialect
    pub fn keyword(&self) -> &'static str {
        match self {
            DiagramKind::Flowchart => "flowchart",
            DiagramKind::Sequence => "sequenceDiagram",
            DiagramKind::Class => "classDiagram",
            DiagramKind::State => "stateDiagram-v2",
            DiagramKind::EntityRelationship => "erDiagram",
            DiagramKind::Gantt => "gantt",
            DiagramKind::Journey => "journey",
            DiagramKind::Mindmap => "mindmap",
            DiagramKind::Pie => "pie",
            DiagramKind::GitGraph => "gitGraph",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            DiagramKind::Flowchart => "Flowchart",
            DiagramKind::Sequence => "Sequence diagram",
            DiagramKind::Class => "Class diagram",
            DiagramKind::State => "State diagram",
            DiagramKind::EntityRelationship => "Entity relationship diagram",
            DiagramKind::Gantt => "Gantt chart",
            DiagramKind::Journey => "User journey",
            DiagramKind::Mindmap => "Mindmap",
            DiagramKind::Pie => "Pie chart",
            DiagramKind::GitGraph => "Git graph",
        }
    }

    /// Detect the dialect from the header keyword of a source
    ///
    /// Blank lines, `%%` comments/directives and a leading `---` front-matter
    /// block are skipped before the keyword is read.
    pub fn detect(source: &str) -> Option<DiagramKind> {
        let mut in_front_matter = false;

        for (index, line) in source.lines().map(str::trim).enumerate() {
            if index == 0 && line == "---" {
                in_front_matter = true;
                continue;
            }
            if in_front_matter {
                if line == "---" {
                    in_front_matter = false;
                }
                continue;
            }
            if line.is_empty() || line.starts_with("%%") {
                continue;
            }
            let keyword = line
                .split(|c: char| c.is_whitespace() || c == ';' || c == ':')
                .next()
                .unwrap_or_default();
            return Self::from_keyword(keyword);
        }
        None
    }

    fn from_keyword(keyword: &str) -> Option<DiagramKind> {
        match keyword {
            "graph" | "flowchart" | "flowchart-elk" => Some(DiagramKind::Flowchart),
            "sequenceDiagram" => Some(DiagramKind::Sequence),
            "classDiagram" | "classDiagram-v2" => Some(DiagramKind::Class),
            "stateDiagram" | "stateDiagram-v2" => Some(DiagramKind::State),
            "erDiagram" => Some(DiagramKind::EntityRelationship),
            "gantt" => Some(DiagramKind::Gantt),
            "journey" => Some(DiagramKind::Journey),
            "mindmap" => Some(DiagramKind::Mindmap),
            "pie" => Some(DiagramKind::Pie),
            "gitGraph" => Some(DiagramKind::GitGraph),
            _ => None,
        }
    }
}

impl FromStr for DiagramKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flowchart" | "graph" => Ok(DiagramKind::Flowchart),
            "sequence" | "sequencediagram" => Ok(DiagramKind::Sequence),
            "class" | "classdiagram" => Ok(DiagramKind::Class),
            "state" | "statediagram" => Ok(DiagramKind::State),
            "er" | "erdiagram" | "entity-relationship" => Ok(DiagramKind::EntityRelationship),
            "gantt" => Ok(DiagramKind::Gantt),
            "journey" => Ok(DiagramKind::Journey),
            "mindmap" => Ok(DiagramKind::Mindmap),
            "pie" => Ok(DiagramKind::Pie),
            "gitgraph" | "git" => Ok(DiagramKind::GitGraph),
            _ => Err(format!("Unknown diagram kind: {}", s)),
        }
    }
}

impl fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
