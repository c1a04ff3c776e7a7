//! # Component Queries
//!
//! A [`Query`] is a tuple of component types, `(Position,)` up to six
//! elements. The world turns it into a list of type keys, intersects the
//! holder sets of those keys and fetches the matching components from each
//! entity.

#![allow(unsafe_code)]

use super::component::Component;
use super::entity::Entity;
use super::polymorph::{Polymorph, TypeKey};

/// A tuple of component types that can be fetched together.
pub trait Query {
    /// Shared references to every component of the tuple.
    type Item<'a>;
    /// Exclusive references to every component of the tuple.
    type ItemMut<'a>;

    /// Keys of the tuple's component types, in tuple order.
    fn keys() -> Vec<TypeKey>;

    /// Fetches every component, or `None` if one is missing.
    fn fetch(entity: &Entity) -> Option<Self::Item<'_>>;

    /// Fetches every component mutably, or `None` if one is missing or the
    /// tuple names the same type twice.
    fn fetch_mut(entity: &mut Entity) -> Option<Self::ItemMut<'_>>;
}

macro_rules! impl_query {
    ($count:literal; $($name:ident => $slot:ident),+) => {
        impl<$($name: Component),+> Query for ($($name,)+) {
            type Item<'a> = ($(&'a $name,)+);
            type ItemMut<'a> = ($(&'a mut $name,)+);

            fn keys() -> Vec<TypeKey> {
                vec![$($name::key()),+]
            }

            fn fetch(entity: &Entity) -> Option<Self::Item<'_>> {
                Some(($(entity.cell(&$name::key())?.get::<$name>().ok()?,)+))
            }

            fn fetch_mut(entity: &mut Entity) -> Option<Self::ItemMut<'_>> {
                let keys = [$($name::key()),+];
                let mut slots: [Option<&mut Polymorph>; $count] = Default::default();
                for (key, cell) in entity.cells_mut() {
                    if let Some(index) = keys.iter().position(|wanted| wanted == key) {
                        slots[index] = Some(cell);
                    }
                }
                let [$($slot),+] = slots;
                // SAFETY: every cell was found under its own type key, and the
                // world only ever stores a `T` under `T::key()`.
                Some(($(unsafe { $slot?.get_unchecked_mut::<$name>() },)+))
            }
        }
    };
}

impl_query!(1; A => a);
impl_query!(2; A => a, B => b);
impl_query!(3; A => a, B => b, C => c);
impl_query!(4; A => a, B => b, C => c, D => d);
impl_query!(5; A => a, B => b, C => c, D => d, E => e);
impl_query!(6; A => a, B => b, C => c, D => d, E => e, F => f);
