//! Collaborator interfaces: AI diagram generation and code generation.
//!
//! Neither is implemented here. Diagram generators hand back a graph which
//! the engine applies with the same mutations as a file import, so generated
//! layers are indistinguishable from imported ones.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::config::ProjectConfig;
use crate::exchange::{ExchangeError, validate_graph};
use crate::layer::{Layer, LayerId, new_id};
use crate::store::{DiagramSnapshot, Mutation, StoreError};

/// Largest image accepted by diagram generators.
pub const MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;
/// Largest audio clip accepted by diagram generators.
pub const MAX_AUDIO_BYTES: usize = 20 * 1024 * 1024;

/// Generation errors.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Unsupported media type {found}, expected {expected}/*")]
    UnsupportedMedia { expected: &'static str, found: String },
    #[error("File is too large ({size} bytes), maximum is {max} bytes")]
    TooLarge { size: usize, max: usize },
    #[error("Prompt is empty")]
    EmptyPrompt,
    #[error("Generated diagram is inconsistent: {0}")]
    InvalidDiagram(#[from] ExchangeError),
    #[error("Generation failed: {0}")]
    Provider(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for generation.
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Boxed future for async collaborators.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Media handed to a diagram generator.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationInput {
    /// Natural language description.
    Text(String),
    /// Picture of a diagram (photo, whiteboard, screenshot).
    Image { mime: String, bytes: Vec<u8> },
    /// Spoken description.
    Audio { mime: String, bytes: Vec<u8> },
}

impl GenerationInput {
    /// Reject inputs no generator can accept, before anything is sent.
    pub fn validate(&self) -> GenerationResult<()> {
        match self {
            GenerationInput::Text(text) => {
                if text.trim().is_empty() {
                    return Err(GenerationError::EmptyPrompt);
                }
                Ok(())
            }
            GenerationInput::Image { mime, bytes } => check_media(mime, bytes, "image", MAX_IMAGE_BYTES),
            GenerationInput::Audio { mime, bytes } => check_media(mime, bytes, "audio", MAX_AUDIO_BYTES),
        }
    }
}

fn check_media(mime: &str, bytes: &[u8], expected: &'static str, max: usize) -> GenerationResult<()> {
    let is_expected = mime
        .split_once('/')
        .is_some_and(|(kind, _)| kind.eq_ignore_ascii_case(expected));
    if !is_expected {
        return Err(GenerationError::UnsupportedMedia {
            expected,
            found: mime.to_string(),
        });
    }
    if bytes.len() > max {
        return Err(GenerationError::TooLarge {
            size: bytes.len(),
            max,
        });
    }
    Ok(())
}

/// How a generated diagram lands in the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Clear the document first instead of appending.
    pub replace: bool,
}

/// Turns media into a diagram graph. Implementations wrap an inference service.
pub trait DiagramGenerator {
    fn generate(&self, input: &GenerationInput) -> BoxFuture<'_, GenerationResult<DiagramSnapshot>>;
}

/// A downloadable artifact produced by a code generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Read-only consumer of the diagram, e.g. backend scaffolding or SQL schema.
pub trait CodeGenerator {
    fn generate(&self, diagram: &DiagramSnapshot, config: &ProjectConfig) -> GenerationResult<Artifact>;
}

/// Mutations that put a generated diagram into a document currently holding
/// `existing`.
///
/// When appending, generated ids that already exist in the document are
/// replaced by fresh ones and relation endpoints are rewritten to match.
pub fn generated_batch(
    existing: &DiagramSnapshot,
    generated: DiagramSnapshot,
    options: GenerateOptions,
) -> GenerationResult<Vec<Mutation>> {
    validate_graph(&generated.layers, &generated.layer_ids)?;

    let mut batch = Vec::with_capacity(generated.layer_ids.len() + 1);
    let DiagramSnapshot {
        mut layers,
        layer_ids,
    } = generated;

    let renames: HashMap<LayerId, LayerId> = if options.replace {
        batch.push(Mutation::Clear);
        HashMap::new()
    } else {
        layer_ids
            .iter()
            .filter(|id| existing.layers.contains_key(*id))
            .map(|id| (id.clone(), new_id()))
            .collect()
    };
    let rename = |id: &LayerId| renames.get(id).cloned().unwrap_or_else(|| id.clone());

    let mut renamed: BTreeMap<LayerId, Layer> = BTreeMap::new();
    for id in &layer_ids {
        if let Some(mut layer) = layers.remove(id) {
            if let Layer::Relation(r) = &mut layer {
                r.source_id = rename(&r.source_id);
                r.target_id = rename(&r.target_id);
            }
            renamed.insert(rename(id), layer);
        }
    }
    for id in &layer_ids {
        let target = rename(id);
        if let Some(layer) = renamed.remove(&target) {
            batch.push(Mutation::InsertLayer { id: target, layer });
        }
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{EntityLayer, RelationLayer, RelationType};
    use kurbo::Point;

    fn graph(ids: &[&str]) -> DiagramSnapshot {
        let mut snap = DiagramSnapshot::default();
        for id in ids {
            snap.layers.insert(
                id.to_string(),
                Layer::Entity(EntityLayer::with_defaults(Point::ORIGIN, 10.0, 10.0)),
            );
            snap.layer_ids.push(id.to_string());
        }
        snap
    }

    #[test]
    fn test_media_validation() {
        let ok = GenerationInput::Image {
            mime: "image/png".into(),
            bytes: vec![0; 10],
        };
        assert!(ok.validate().is_ok());

        let wrong = GenerationInput::Image {
            mime: "audio/wav".into(),
            bytes: vec![0; 10],
        };
        assert!(matches!(wrong.validate(), Err(GenerationError::UnsupportedMedia { .. })));

        let big = GenerationInput::Audio {
            mime: "audio/webm".into(),
            bytes: vec![0; MAX_AUDIO_BYTES + 1],
        };
        assert!(matches!(big.validate(), Err(GenerationError::TooLarge { .. })));

        assert!(matches!(
            GenerationInput::Text("  \n".into()).validate(),
            Err(GenerationError::EmptyPrompt)
        ));
    }

    #[test]
    fn test_replace_clears_first() {
        let existing = graph(&["a"]);
        let batch = generated_batch(&existing, graph(&["a", "b"]), GenerateOptions { replace: true }).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0], Mutation::Clear);
        assert!(matches!(&batch[1], Mutation::InsertLayer { id, .. } if id == "a"));
    }

    #[test]
    fn test_append_renames_colliding_ids() {
        let existing = graph(&["a"]);
        let mut generated = graph(&["a", "b"]);
        generated.layers.insert(
            "r".into(),
            Layer::Relation(RelationLayer::new("a", "b", RelationType::Composition)),
        );
        generated.layer_ids.push("r".into());

        let batch = generated_batch(&existing, generated, GenerateOptions::default()).unwrap();
        assert_eq!(batch.len(), 3);
        let Mutation::InsertLayer { id: first, .. } = &batch[0] else {
            panic!("expected insert");
        };
        assert_ne!(first, "a");
        let Mutation::InsertLayer {
            layer: Layer::Relation(rel),
            ..
        } = &batch[2]
        else {
            panic!("expected relation insert");
        };
        assert_eq!(&rel.source_id, first);
        assert_eq!(rel.target_id, "b");
    }

    #[test]
    fn test_inconsistent_generated_graph() {
        let mut generated = graph(&["a"]);
        generated.layer_ids.push("ghost".into());
        let result = generated_batch(&DiagramSnapshot::default(), generated, GenerateOptions::default());
        assert!(matches!(result, Err(GenerationError::InvalidDiagram(_))));
    }

    struct TableCounter;

    impl CodeGenerator for TableCounter {
        fn generate(&self, diagram: &DiagramSnapshot, config: &ProjectConfig) -> GenerationResult<Artifact> {
            let tables = diagram.ordered().filter(|(_, l)| l.as_entity().is_some()).count();
            Ok(Artifact {
                file_name: format!("{}.txt", config.artifact_id),
                bytes: tables.to_string().into_bytes(),
            })
        }
    }

    #[test]
    fn test_code_generator_reads_snapshot() {
        let artifact = TableCounter
            .generate(&graph(&["a", "b"]), &ProjectConfig::default())
            .unwrap();
        assert_eq!(artifact.file_name, "mi-proyecto.txt");
        assert_eq!(artifact.bytes, b"2");
    }
}
