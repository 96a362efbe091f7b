// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed UUIDs for the entities the installer touches.
//!
//! A node id and a cluster id are both UUIDs, and it is easy to pass one where
//! the other was expected. Giving each its own type turns that mistake into a
//! compile error.

use newtype_uuid::TypedUuid;
use newtype_uuid::TypedUuidKind;
use newtype_uuid::TypedUuidTag;

macro_rules! impl_typed_uuid_kind {
    ($($kind:ident => $tag:literal),* $(,)?) => {
        $(
            pub enum $kind {}

            impl TypedUuidKind for $kind {
                #[inline]
                fn tag() -> TypedUuidTag {
                    const TAG: TypedUuidTag = TypedUuidTag::new($tag);
                    TAG
                }
            }
        )*
    };
}

impl_typed_uuid_kind! {
    ClusterKind => "cluster",
    NodeKind => "node",
    ProviderKind => "provider",
}

pub type ClusterUuid = TypedUuid<ClusterKind>;
pub type NodeUuid = TypedUuid<NodeKind>;
pub type ProviderUuid = TypedUuid<ProviderKind>;
