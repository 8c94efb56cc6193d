//! Handler signatures and their adapters.
//!
//! # Responsibilities
//! - Define the handler outcome (`Flow`) and the `Next` token
//! - Normalize every accepted method signature into one callable shape
//! - Record each method's declared arity for decoration-time validation
//! - Bind normalized handlers to their owning controller instance
//!
//! # Design Decisions
//! - Arity is read from the Rust signature through marker types, not reflection
//! - Arity 0 is the factory form: a function returning the handler list
//! - Handlers are synchronous; the request body is buffered before dispatch

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::http::{Request, Response};

/// Outcome of a single handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Pass control to the next handler in the chain.
    Continue,
    /// The response is complete; stop dispatching.
    Halt,
}

/// Continuation token handed to three- and four-argument handlers.
#[derive(Debug)]
pub struct Next(());

impl Next {
    pub(crate) fn new() -> Self {
        Next(())
    }

    /// Continue with the next handler.
    pub fn run(self) -> Flow {
        Flow::Continue
    }
}

/// Marker selecting a handler adapter by declared argument count.
pub struct Arity<const N: usize>(PhantomData<()>);

type HandlerFn<T> = dyn Fn(&T, &mut Request, &mut Response, Option<&str>) -> Flow + Send + Sync;

/// A handler method of controller `T`, normalized to a single shape.
pub struct Handler<T> {
    arity: usize,
    call: Arc<HandlerFn<T>>,
}

impl<T> Clone for Handler<T> {
    fn clone(&self) -> Self {
        Self {
            arity: self.arity,
            call: Arc::clone(&self.call),
        }
    }
}

impl<T> fmt::Debug for Handler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("arity", &self.arity).finish()
    }
}

impl<T: Send + Sync + 'static> Handler<T> {
    /// Wrap any supported handler signature.
    pub fn new<H, M>(handler: H) -> Self
    where
        H: IntoHandler<T, M>,
    {
        handler.into_handler()
    }

    /// Number of arguments the handler declares, excluding the receiver.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Invoke against an instance directly.
    pub fn call(&self, this: &T, req: &mut Request, res: &mut Response, value: Option<&str>) -> Flow {
        (self.call)(this, req, res, value)
    }

    /// Fix the execution context to `instance`.
    pub fn bind(&self, instance: Arc<T>) -> BoundHandler {
        let call = Arc::clone(&self.call);
        BoundHandler(Arc::new(
            move |req: &mut Request, res: &mut Response, value: Option<&str>| {
                call(&instance, req, res, value)
            },
        ))
    }
}

/// Conversion of a function with a supported signature into a [`Handler`].
pub trait IntoHandler<T, M>: Send + Sync + 'static {
    fn into_handler(self) -> Handler<T>;
}

impl<T, F> IntoHandler<T, Arity<1>> for F
where
    T: 'static,
    F: Fn(&T, &mut Request) -> Flow + Send + Sync + 'static,
{
    fn into_handler(self) -> Handler<T> {
        Handler {
            arity: 1,
            call: Arc::new(
                move |this: &T, req: &mut Request, _res: &mut Response, _value: Option<&str>| {
                    self(this, req)
                },
            ),
        }
    }
}

impl<T, F> IntoHandler<T, Arity<2>> for F
where
    T: 'static,
    F: Fn(&T, &mut Request, &mut Response) -> Flow + Send + Sync + 'static,
{
    fn into_handler(self) -> Handler<T> {
        Handler {
            arity: 2,
            call: Arc::new(
                move |this: &T, req: &mut Request, res: &mut Response, _value: Option<&str>| {
                    self(this, req, res)
                },
            ),
        }
    }
}

impl<T, F> IntoHandler<T, Arity<3>> for F
where
    T: 'static,
    F: Fn(&T, &mut Request, &mut Response, Next) -> Flow + Send + Sync + 'static,
{
    fn into_handler(self) -> Handler<T> {
        Handler {
            arity: 3,
            call: Arc::new(
                move |this: &T, req: &mut Request, res: &mut Response, _value: Option<&str>| {
                    self(this, req, res, Next::new())
                },
            ),
        }
    }
}

impl<T, F> IntoHandler<T, Arity<4>> for F
where
    T: 'static,
    F: Fn(&T, &mut Request, &mut Response, Next, &str) -> Flow + Send + Sync + 'static,
{
    fn into_handler(self) -> Handler<T> {
        Handler {
            arity: 4,
            call: Arc::new(
                move |this: &T, req: &mut Request, res: &mut Response, value: Option<&str>| {
                    self(this, req, res, Next::new(), value.unwrap_or_default())
                },
            ),
        }
    }
}

/// A declared method before decoration: either a handler, or a factory
/// producing the handler list.
pub enum MethodFn<T> {
    Factory(Box<dyn Fn() -> Vec<Handler<T>> + Send + Sync>),
    Direct(Handler<T>),
}

impl<T> MethodFn<T> {
    /// Declared argument count. Factories declare none.
    pub fn arity(&self) -> usize {
        match self {
            MethodFn::Factory(_) => 0,
            MethodFn::Direct(h) => h.arity,
        }
    }

    /// Produce the normalized handler list. Factories run once per call.
    pub(crate) fn handlers(&self) -> Vec<Handler<T>> {
        match self {
            MethodFn::Factory(make) => make(),
            MethodFn::Direct(h) => vec![h.clone()],
        }
    }
}

/// Conversion of a declared method into a [`MethodFn`].
pub trait IntoMethod<T, M>: Send + Sync + 'static {
    fn into_method(self) -> MethodFn<T>;
}

impl<T, F> IntoMethod<T, Arity<0>> for F
where
    T: 'static,
    F: Fn() -> Vec<Handler<T>> + Send + Sync + 'static,
{
    fn into_method(self) -> MethodFn<T> {
        MethodFn::Factory(Box::new(self))
    }
}

impl<T, F> IntoMethod<T, Arity<1>> for F
where
    T: 'static,
    F: Fn(&T, &mut Request) -> Flow + Send + Sync + 'static,
{
    fn into_method(self) -> MethodFn<T> {
        MethodFn::Direct(IntoHandler::<T, Arity<1>>::into_handler(self))
    }
}

impl<T, F> IntoMethod<T, Arity<2>> for F
where
    T: 'static,
    F: Fn(&T, &mut Request, &mut Response) -> Flow + Send + Sync + 'static,
{
    fn into_method(self) -> MethodFn<T> {
        MethodFn::Direct(IntoHandler::<T, Arity<2>>::into_handler(self))
    }
}

impl<T, F> IntoMethod<T, Arity<3>> for F
where
    T: 'static,
    F: Fn(&T, &mut Request, &mut Response, Next) -> Flow + Send + Sync + 'static,
{
    fn into_method(self) -> MethodFn<T> {
        MethodFn::Direct(IntoHandler::<T, Arity<3>>::into_handler(self))
    }
}

impl<T, F> IntoMethod<T, Arity<4>> for F
where
    T: 'static,
    F: Fn(&T, &mut Request, &mut Response, Next, &str) -> Flow + Send + Sync + 'static,
{
    fn into_method(self) -> MethodFn<T> {
        MethodFn::Direct(IntoHandler::<T, Arity<4>>::into_handler(self))
    }
}

type BoundFn = dyn Fn(&mut Request, &mut Response, Option<&str>) -> Flow + Send + Sync;

/// A handler with its execution context fixed, ready for the router.
#[derive(Clone)]
pub struct BoundHandler(Arc<BoundFn>);

impl fmt::Debug for BoundHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoundHandler")
    }
}

impl BoundHandler {
    /// A free-standing middleware or route handler.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response, Next) -> Flow + Send + Sync + 'static,
    {
        BoundHandler(Arc::new(
            move |req: &mut Request, res: &mut Response, _value: Option<&str>| {
                f(req, res, Next::new())
            },
        ))
    }

    /// A free-standing path-parameter interceptor.
    pub fn param<F>(f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response, Next, &str) -> Flow + Send + Sync + 'static,
    {
        BoundHandler(Arc::new(
            move |req: &mut Request, res: &mut Response, value: Option<&str>| {
                f(req, res, Next::new(), value.unwrap_or_default())
            },
        ))
    }

    pub fn call(&self, req: &mut Request, res: &mut Response, value: Option<&str>) -> Flow {
        (self.0)(req, res, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Greeter {
        greeting: &'static str,
    }

    impl Greeter {
        fn one(&self, _req: &mut Request) -> Flow {
            Flow::Continue
        }

        fn two(&self, _req: &mut Request, res: &mut Response) -> Flow {
            res.send(self.greeting)
        }

        fn three(&self, _req: &mut Request, _res: &mut Response, next: Next) -> Flow {
            next.run()
        }

        fn four(&self, req: &mut Request, _res: &mut Response, next: Next, value: &str) -> Flow {
            req.query.insert("seen".into(), value.to_string());
            next.run()
        }
    }

    #[test]
    fn test_arity_is_read_from_signature() {
        assert_eq!(Handler::<Greeter>::new(Greeter::one).arity(), 1);
        assert_eq!(Handler::<Greeter>::new(Greeter::two).arity(), 2);
        assert_eq!(Handler::<Greeter>::new(Greeter::three).arity(), 3);
        assert_eq!(Handler::<Greeter>::new(Greeter::four).arity(), 4);

        let factory = IntoMethod::<Greeter, Arity<0>>::into_method(|| vec![Handler::new(Greeter::two)]);
        assert_eq!(factory.arity(), 0);
        assert_eq!(factory.handlers().len(), 1);
    }

    #[test]
    fn test_bound_handler_uses_instance() {
        let instance = Arc::new(Greeter { greeting: "hello" });
        let bound = Handler::new(Greeter::two).bind(instance);

        let mut req = Request::get("/");
        let mut res = Response::new();
        assert_eq!(bound.call(&mut req, &mut res, None), Flow::Halt);
        assert_eq!(res.body_text(), "hello");
    }

    #[test]
    fn test_param_value_is_forwarded() {
        let bound = Handler::new(Greeter::four).bind(Arc::new(Greeter::default()));
        let mut req = Request::get("/42");
        let mut res = Response::new();
        assert_eq!(bound.call(&mut req, &mut res, Some("42")), Flow::Continue);
        assert_eq!(req.query.get("seen").map(String::as_str), Some("42"));
    }
}
