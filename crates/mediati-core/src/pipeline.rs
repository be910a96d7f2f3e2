//! Pipeline builder.
//!
//! [`build`] validates a handler's ordered decorator list and returns a
//! [`ChainFactory`]: a closure that constructs a fully wired chain on demand.
//! The chain is assembled inside out. The handler is built first, then each
//! decorator is wrapped around the chain built so far, starting with the last
//! declaration after sorting. The first declaration therefore ends up as the
//! outermost link.
//!
//! Every link is initialised from its declaration right after it is built.
//! All payloads are decoded before anything is constructed, and the factory
//! is run once before it is returned, so configuration and dependency
//! problems are reported while the handler is being registered rather than
//! on its first dispatch.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::decorator::{DecoratorDeclaration, Link, TemplateKey};
use crate::dependency::Resolve;
use crate::error::{PipelineError, PipelineResult};
use crate::handler::{BoxedHandler, Construct, Handler};
use crate::message::Message;

/// Builds a fresh chain for message type `M`.
pub type ChainFactory<M> = Arc<dyn Fn() -> PipelineResult<BoxedHandler<M>> + Send + Sync>;

/// A declaration whose payload has been decoded.
struct Prepared<M: Message> {
    declaration: DecoratorDeclaration<M>,
    config: Arc<dyn Any + Send + Sync>,
}

/// Builds the chain factory for handler `H` answering `M`.
///
/// `decorators` must already be in chain order (see
/// [`read_decorators`](crate::read_decorators)).
pub fn build<H, M>(
    handler: &'static str,
    decorators: Vec<DecoratorDeclaration<M>>,
    deps: Arc<dyn Resolve>,
) -> PipelineResult<ChainFactory<M>>
where
    H: Handler<M> + Construct,
    M: Message,
{
    let prepared = Arc::new(prepare(decorators)?);

    let factory: ChainFactory<M> = Arc::new(move || assemble::<H, M>(&prepared, deps.as_ref()));

    factory()?;
    debug!(handler, "Built pipeline");

    Ok(factory)
}

fn prepare<M: Message>(decorators: Vec<DecoratorDeclaration<M>>) -> PipelineResult<Vec<Prepared<M>>> {
    let mut counts: HashMap<TemplateKey, usize> = HashMap::new();
    for decl in &decorators {
        *counts.entry(decl.template()).or_default() += 1;
    }
    if let Some(decl) = decorators.iter().find(|d| counts[&d.template()] > 1) {
        return Err(PipelineError::AmbiguousDecorator {
            template: decl.template().name(),
            count: counts[&decl.template()],
        });
    }

    decorators
        .into_iter()
        .map(|declaration| {
            let config = declaration.decode()?;
            Ok(Prepared {
                declaration,
                config,
            })
        })
        .collect()
}

fn assemble<H, M>(prepared: &[Prepared<M>], deps: &dyn Resolve) -> PipelineResult<BoxedHandler<M>>
where
    H: Handler<M> + Construct,
    M: Message,
{
    let mut chain: BoxedHandler<M> = Box::new(H::construct(deps)?);

    for current in prepared.iter().rev() {
        let mut link = current.declaration.wrap(chain, deps)?;
        initialise(link.as_mut(), prepared)?;
        trace!(template = current.declaration.template().name(), "Wrapped link");
        chain = link;
    }

    Ok(chain)
}

/// Initialises `link` from the declaration that names its template.
fn initialise<M: Message>(link: &mut dyn Link<M>, prepared: &[Prepared<M>]) -> PipelineResult<()> {
    if let Some(template) = link.declaring_template()
        && let Some(found) = prepared
            .iter()
            .find(|p| p.declaration.template() == template)
        && let Some(target) = link.as_initialisable()
    {
        target.initialise_erased(template.name(), found.config.as_ref())?;
    }
    Ok(())
}
