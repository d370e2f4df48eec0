//! Editor runtimes: whatever actually repairs a block in a document.

use std::sync::Arc;

use async_trait::async_trait;
use blockguard_core::{
    BlockDefinition, BlockNode, BlockRegistry, BlockRenderer, BlockStatus, DocumentId, ParseError,
    RenderError, Validator, parse_blocks, serialize_blocks,
};
use blockguard_store::{ContentStore, StoreError};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("document {0} not found")]
    DocumentNotFound(DocumentId),
    #[error("block {0} is not registered")]
    Unregistered(String),
    #[error("block {0} is static and can only be repaired in the editor")]
    Unsupported(String),
    #[error("no {block} block in document {document_id} needed repair")]
    NothingToRepair {
        document_id: DocumentId,
        block: String,
    },
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error("markup could not be parsed: {0}")]
    Parse(#[from] ParseError),
    #[error("content store error: {0}")]
    Store(#[from] StoreError),
}

/// Repairs every recovery-mode occurrence of one block in one document.
///
/// Completion of the returned future is the completion signal; dropping it
/// abandons the attempt.
#[async_trait]
pub trait EditorRuntime: Send + Sync {
    async fn submit(&self, document_id: DocumentId, block_name: &str) -> Result<(), RuntimeError>;
}

/// Regenerates dynamic blocks from their attributes and writes the result
/// back through the content store.
pub struct RenderRepairRuntime {
    store: Arc<dyn ContentStore>,
    registry: Arc<BlockRegistry>,
}

impl RenderRepairRuntime {
    pub fn new(store: Arc<dyn ContentStore>, registry: Arc<BlockRegistry>) -> Self {
        Self { store, registry }
    }
}

#[async_trait]
impl EditorRuntime for RenderRepairRuntime {
    async fn submit(&self, document_id: DocumentId, block_name: &str) -> Result<(), RuntimeError> {
        let renderer = match self.registry.get(block_name) {
            Some(BlockDefinition::Dynamic(renderer)) => renderer.clone(),
            Some(BlockDefinition::Static) => {
                return Err(RuntimeError::Unsupported(block_name.to_string()));
            }
            None => return Err(RuntimeError::Unregistered(block_name.to_string())),
        };
        let doc = self
            .store
            .get(document_id)
            .await?
            .ok_or(RuntimeError::DocumentNotFound(document_id))?;

        let mut blocks = parse_blocks(&doc.content)?;
        let validator = Validator::new(&self.registry);
        let repaired = repair(&mut blocks, block_name, &validator, renderer.as_ref())?;
        if repaired == 0 {
            return Err(RuntimeError::NothingToRepair {
                document_id,
                block: block_name.to_string(),
            });
        }

        self.store
            .update_content(document_id, &serialize_blocks(&blocks))
            .await?;
        debug!(document_id, block = block_name, repaired, "document rewritten");
        Ok(())
    }
}

fn repair(
    nodes: &mut [BlockNode],
    block_name: &str,
    validator: &Validator<'_>,
    renderer: &dyn BlockRenderer,
) -> Result<usize, RuntimeError> {
    let mut repaired = 0;
    for node in nodes.iter_mut() {
        if node.block_name() == block_name
            && node.inner_blocks.is_empty()
            && validator.validate(node).status == BlockStatus::RecoveryMode
        {
            let synthetic = BlockNode::named(block_name, node.attrs.clone());
            let markup = renderer.render(&synthetic)?;
            if node.replace_markup(&markup) {
                repaired += 1;
            }
        }
        repaired += repair(&mut node.inner_blocks, block_name, validator, renderer)?;
    }
    Ok(repaired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockguard_core::{Document, DocumentStatus, TemplateRenderer};
    use blockguard_store::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, RenderRepairRuntime) {
        let mut registry = BlockRegistry::new();
        registry.register_static("core/group");
        registry.register_dynamic(
            "custom/card",
            Arc::new(TemplateRenderer::new(
                r#"<li><article class="card"><p>{{title}}</p></article></li>"#,
            )),
        );
        let store = Arc::new(MemoryStore::new());
        let runtime = RenderRepairRuntime::new(store.clone(), Arc::new(registry));
        (store, runtime)
    }

    #[tokio::test]
    async fn rewrites_nested_stale_card() {
        let (store, runtime) = setup();
        store.insert(Document::new(
            1,
            "post",
            DocumentStatus::Published,
            "One",
            r#"<!-- wp:group --><div><!-- wp:custom/card {"title":"A"} --><li><div class="card"><p>A</p></div></li><!-- /wp:custom/card --></div><!-- /wp:group -->"#,
        ));

        runtime.submit(1, "custom/card").await.unwrap();
        let content = store.get(1).await.unwrap().unwrap().content;
        assert!(content.contains(r#"<li><article class="card"><p>A</p></article></li>"#));
        assert!(content.starts_with("<!-- wp:group -->"));

        let again = runtime.submit(1, "custom/card").await.unwrap_err();
        assert!(matches!(again, RuntimeError::NothingToRepair { .. }));
    }

    #[tokio::test]
    async fn static_and_unknown_blocks_are_refused() {
        let (store, runtime) = setup();
        store.insert(Document::new(1, "post", DocumentStatus::Published, "", ""));
        assert!(matches!(
            runtime.submit(1, "core/group").await,
            Err(RuntimeError::Unsupported(_))
        ));
        assert!(matches!(
            runtime.submit(1, "custom/ghost").await,
            Err(RuntimeError::Unregistered(_))
        ));
        assert!(matches!(
            runtime.submit(9, "custom/card").await,
            Err(RuntimeError::DocumentNotFound(9))
        ));
    }
}
