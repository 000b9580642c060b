use anyhow::{Context, Result};
use std::marker::PhantomData;

/// A stateless conversion from `I` to `O`.
///
/// Transforms are shared by every pipeline worker, hence `Send + Sync`.
/// Steps compose with [`Transform::then`]; the intermediate type of the chain
/// is checked at compile time.
pub trait Transform<I, O>: Send + Sync {
    fn apply(&self, input: I) -> Result<O>;

    #[inline]
    fn then<T, M>(self, next: T) -> Chain<Self, T, O>
    where
        Self: Sized,
        T: Transform<O, M>,
        O: Send,
        M: Send,
    {
        Chain::new(self, next)
    }
}

/// Two transforms applied back to back. `M` is the type handed from the
/// first step to the second.
#[derive(Debug)]
pub struct Chain<A, B, M> {
    first: A,
    second: B,
    _marker: PhantomData<fn() -> M>,
}

impl<A, B, M> Chain<A, B, M> {
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            _marker: PhantomData,
        }
    }
}

impl<I, M, O, A, B> Transform<I, O> for Chain<A, B, M>
where
    A: Transform<I, M>,
    B: Transform<M, O>,
    M: Send,
{
    fn apply(&self, input: I) -> Result<O> {
        let mid = self
            .first
            .apply(input)
            .with_context(|| format!("{} failed", short_type_name::<A>()))?;
        self.second
            .apply(mid)
            .with_context(|| format!("{} failed", short_type_name::<B>()))
    }
}

/// `a::b::Chain<x::Y, z::W>` -> `Chain<Y, W>`, for readable error chains.
fn short_type_name<T>() -> String {
    let full = std::any::type_name::<T>();
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for ch in full.chars() {
        match ch {
            ':' => segment.clear(),
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                out.push_str(&segment);
                segment.clear();
                out.push(ch);
            }
            _ => segment.push(ch),
        }
    }
    out.push_str(&segment);
    out
}
