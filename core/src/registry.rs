//! Capability registry contract and the default in-memory registry.
//!
//! A capability is identified by a type: usually a trait object type such as
//! `dyn RequestHandler<CreateOrder>`. Registration is explicit; there is no
//! runtime type scanning. The registry supports two lookups:
//!
//! - **resolve one**: fails with [`DispatchError::NotRegistered`] if nothing is
//!   bound, or [`DispatchError::AmbiguousHandler`] if more than one is
//! - **resolve all**: returns every binding in registration order, or an empty
//!   list if nothing is bound
//!
//! # Example
//!
//! ```ignore
//! use dispatcher_core::{HandlerRegistryExt, RequestHandler, ServiceRegistry};
//!
//! let registry = ServiceRegistry::new();
//! registry.register_handler::<CreateOrder, _>(CreateOrderHandler::new(db));
//! registry.register_behavior::<CreateOrder, _>(AuditBehavior);
//!
//! let handler = registry.resolve_one::<dyn RequestHandler<CreateOrder>>()?;
//! ```

use crate::error::DispatchError;
use crate::handler::{
    NotificationHandler, RequestHandler, RequestPostProcessor, RequestPreProcessor,
    StreamRequestHandler,
};
use crate::pipeline::PipelineBehavior;
use crate::request::{Notification, Request, StreamRequest, shorten};
use crate::validation::Validator;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// A type-erased bound implementation.
///
/// For a capability `C` the binding always holds an `Arc<C>`.
pub type Binding = Arc<dyn Any + Send + Sync>;

/// Stable identifier of a capability type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Capability {
    id: TypeId,
    name: &'static str,
}

impl Capability {
    /// Identifier for capability type `C`
    #[must_use]
    pub fn of<C: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<C>(),
            name: std::any::type_name::<C>(),
        }
    }

    /// Type identifier used as the lookup key
    #[must_use]
    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without module paths
    #[must_use]
    pub fn short_name(&self) -> String {
        shorten(self.name)
    }

    /// Erase a typed implementation into a binding
    #[must_use]
    pub fn bind<C: ?Sized + Send + Sync + 'static>(instance: Arc<C>) -> Binding {
        Arc::new(instance)
    }

    /// Recover the typed implementation from a binding
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Registry`] if the binding does not hold an
    /// `Arc<C>`.
    pub fn downcast<C: ?Sized + Send + Sync + 'static>(
        &self,
        binding: &Binding,
    ) -> Result<Arc<C>, DispatchError> {
        binding
            .as_ref()
            .downcast_ref::<Arc<C>>()
            .cloned()
            .ok_or_else(|| DispatchError::Registry {
                capability: self.short_name(),
                reason: "binding does not match the capability type".to_string(),
            })
    }

    pub(crate) fn not_registered(&self) -> DispatchError {
        DispatchError::NotRegistered {
            capability: self.short_name(),
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.short_name())
    }
}

/// Directory service mapping capability types to bound implementations.
///
/// Methods are type-erased so the trait stays dyn-compatible; use
/// [`HandlerRegistryExt`] for typed access.
pub trait HandlerRegistry: Send + Sync {
    /// Resolve exactly one binding for the capability
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NotRegistered`] if nothing is bound
    /// - [`DispatchError::AmbiguousHandler`] if more than one binding exists
    /// - [`DispatchError::Registry`] if a binding could not be produced
    fn lookup_one(&self, capability: Capability) -> Result<Binding, DispatchError>;

    /// Resolve every binding for the capability, in registration order
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Registry`] if a binding could not be
    /// produced. An unbound capability is not an error.
    fn lookup_all(&self, capability: Capability) -> Result<Vec<Binding>, DispatchError>;
}

/// Typed lookups on top of any [`HandlerRegistry`].
pub trait HandlerRegistryExt: HandlerRegistry {
    /// Resolve exactly one implementation of `C`
    ///
    /// # Errors
    ///
    /// See [`HandlerRegistry::lookup_one`].
    fn resolve_one<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<C>, DispatchError> {
        let capability = Capability::of::<C>();
        let binding = self.lookup_one(capability)?;
        capability.downcast(&binding)
    }

    /// Resolve every implementation of `C`
    ///
    /// # Errors
    ///
    /// See [`HandlerRegistry::lookup_all`].
    fn resolve_all<C: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> Result<Vec<Arc<C>>, DispatchError> {
        let capability = Capability::of::<C>();
        self.lookup_all(capability)?
            .iter()
            .map(|binding| capability.downcast(binding))
            .collect()
    }
}

impl<T: HandlerRegistry + ?Sized> HandlerRegistryExt for T {}

type Factory = Arc<dyn Fn() -> Result<Binding, DispatchError> + Send + Sync>;

#[derive(Clone)]
enum Provider {
    Instance(Binding),
    Factory(Factory),
}

impl Provider {
    fn provide(&self) -> Result<Binding, DispatchError> {
        match self {
            Self::Instance(binding) => Ok(Arc::clone(binding)),
            Self::Factory(factory) => factory(),
        }
    }
}

/// Default in-memory registry populated by explicit registration calls.
///
/// Registrations may be added at any time; callers caching lookups (such as
/// the runtime's handler cache) must be cleared to observe later changes to a
/// capability that was already resolved successfully.
#[derive(Default)]
pub struct ServiceRegistry {
    providers: RwLock<HashMap<TypeId, Vec<Provider>>>,
}

impl ServiceRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, capability: Capability, provider: Provider) -> &Self {
        let mut providers = self
            .providers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let bound = providers.entry(capability.id).or_default();
        bound.push(provider);

        tracing::debug!(
            capability = %capability,
            count = bound.len(),
            "Registered capability"
        );
        self
    }

    fn providers(&self, capability: Capability) -> Vec<Provider> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&capability.id)
            .cloned()
            .unwrap_or_default()
    }

    /// Bind a shared instance to capability `C`
    pub fn register<C: ?Sized + Send + Sync + 'static>(&self, instance: Arc<C>) -> &Self {
        self.push(
            Capability::of::<C>(),
            Provider::Instance(Capability::bind(instance)),
        )
    }

    /// Bind a factory invoked on every lookup of capability `C`
    ///
    /// A factory returning an error makes that lookup fail with the error.
    pub fn register_factory<C, F>(&self, factory: F) -> &Self
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn() -> Result<Arc<C>, DispatchError> + Send + Sync + 'static,
    {
        let erased: Factory = Arc::new(move || factory().map(Capability::bind));
        self.push(Capability::of::<C>(), Provider::Factory(erased))
    }

    /// Remove every binding for capability `C`, returning how many were removed
    pub fn unregister_all<C: ?Sized + 'static>(&self) -> usize {
        let removed = self
            .providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&TypeId::of::<C>())
            .map_or(0, |bound| bound.len());

        tracing::debug!(
            capability = %Capability::of::<C>(),
            removed,
            "Unregistered capability"
        );
        removed
    }

    /// Number of bindings for capability `C`
    #[must_use]
    pub fn count<C: ?Sized + 'static>(&self) -> usize {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<C>())
            .map_or(0, Vec::len)
    }

    /// Register the handler for request type `R`
    pub fn register_handler<R, H>(&self, handler: H) -> &Self
    where
        R: Request,
        H: RequestHandler<R> + 'static,
    {
        let handler: Arc<dyn RequestHandler<R>> = Arc::new(handler);
        self.register(handler)
    }

    /// Register a handler for notification type `N`
    pub fn register_notification_handler<N, H>(&self, handler: H) -> &Self
    where
        N: Notification,
        H: NotificationHandler<N> + 'static,
    {
        let handler: Arc<dyn NotificationHandler<N>> = Arc::new(handler);
        self.register(handler)
    }

    /// Register the handler for stream request type `R`
    pub fn register_stream_handler<R, H>(&self, handler: H) -> &Self
    where
        R: StreamRequest,
        H: StreamRequestHandler<R> + 'static,
    {
        let handler: Arc<dyn StreamRequestHandler<R>> = Arc::new(handler);
        self.register(handler)
    }

    /// Register a pipeline behavior for request type `R`
    ///
    /// Behaviors nest in registration order: the first registered is the
    /// outermost wrapper.
    pub fn register_behavior<R, B>(&self, behavior: B) -> &Self
    where
        R: Request,
        B: PipelineBehavior<R> + 'static,
    {
        let behavior: Arc<dyn PipelineBehavior<R>> = Arc::new(behavior);
        self.register(behavior)
    }

    /// Register a pre-processor for request type `R`
    pub fn register_pre_processor<R, P>(&self, processor: P) -> &Self
    where
        R: Request,
        P: RequestPreProcessor<R> + 'static,
    {
        let processor: Arc<dyn RequestPreProcessor<R>> = Arc::new(processor);
        self.register(processor)
    }

    /// Register a post-processor for request type `R`
    pub fn register_post_processor<R, P>(&self, processor: P) -> &Self
    where
        R: Request,
        P: RequestPostProcessor<R> + 'static,
    {
        let processor: Arc<dyn RequestPostProcessor<R>> = Arc::new(processor);
        self.register(processor)
    }

    /// Register a validator for request type `R`
    pub fn register_validator<R, V>(&self, validator: V) -> &Self
    where
        R: Request,
        V: Validator<R> + 'static,
    {
        let validator: Arc<dyn Validator<R>> = Arc::new(validator);
        self.register(validator)
    }
}

impl HandlerRegistry for ServiceRegistry {
    fn lookup_one(&self, capability: Capability) -> Result<Binding, DispatchError> {
        match self.providers(capability).as_slice() {
            [] => Err(capability.not_registered()),
            [provider] => provider.provide(),
            bound => Err(DispatchError::AmbiguousHandler {
                capability: capability.short_name(),
                count: bound.len(),
            }),
        }
    }

    fn lookup_all(&self, capability: Capability) -> Result<Vec<Binding>, DispatchError> {
        self.providers(capability)
            .iter()
            .map(Provider::provide)
            .collect()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let capabilities = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("ServiceRegistry")
            .field("capabilities", &capabilities)
            .finish()
    }
}
