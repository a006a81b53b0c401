//! Error types for the segmerge core library.
//!
//! Each concern of the engine owns a small error enum with a stable
//! machine-readable code. [`SegmentationError`] sits on top and wraps the
//! lower-level errors so callers driving a [`crate::Segmentator`] deal with a
//! single type.

use std::fmt;

use thiserror::Error;

use crate::{graph::RegionId, heap::EdgeId, raster::Point};

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? $( ( $($tuple:tt)* ) )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            #[must_use]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? $( ( $($tuple)* ) )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

/// Errors raised while validating a pixel buffer or label raster.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum RasterError {
    /// Pixel buffers must carry at least one channel.
    #[error("pixel buffer must have at least one channel")]
    ZeroChannels,
    /// The backing storage does not match `width * height * channels`.
    #[error("pixel buffer holds {actual} values but {width}x{height}x{channels} requires {expected}")]
    LengthMismatch {
        /// Image width in pixels.
        width: usize,
        /// Image height in pixels.
        height: usize,
        /// Channels per pixel.
        channels: usize,
        /// Number of values implied by the shape.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },
    /// Two rasters that must share a shape do not.
    #[error("raster is {actual_width}x{actual_height} but {expected_width}x{expected_height} was expected")]
    ShapeMismatch {
        /// Width required by the caller.
        expected_width: usize,
        /// Height required by the caller.
        expected_height: usize,
        /// Width of the supplied raster.
        actual_width: usize,
        /// Height of the supplied raster.
        actual_height: usize,
    },
    /// A label identifier is not below the raster's pixel count.
    #[error("label {label} is out of range for a raster of {pixels} pixels")]
    LabelOutOfRange {
        /// The offending identifier.
        label: RegionId,
        /// Pixel count; every identifier must be smaller.
        pixels: usize,
    },
    /// A coordinate fell outside the raster.
    #[error("point {point} lies outside the {width}x{height} raster")]
    OutOfBounds {
        /// The offending coordinate.
        point: Point,
        /// Raster width.
        width: usize,
        /// Raster height.
        height: usize,
    },
}

define_error_codes! {
    /// Stable codes describing [`RasterError`] variants.
    enum RasterErrorCode for RasterError {
        /// Pixel buffers must carry at least one channel.
        ZeroChannels => ZeroChannels => "RASTER_ZERO_CHANNELS",
        /// The backing storage does not match the declared shape.
        LengthMismatch => LengthMismatch { .. } => "RASTER_LENGTH_MISMATCH",
        /// Two rasters that must share a shape do not.
        ShapeMismatch => ShapeMismatch { .. } => "RASTER_SHAPE_MISMATCH",
        /// A label identifier is not below the raster's pixel count.
        LabelOutOfRange => LabelOutOfRange { .. } => "RASTER_LABEL_OUT_OF_RANGE",
        /// A coordinate fell outside the raster.
        OutOfBounds => OutOfBounds { .. } => "RASTER_OUT_OF_BOUNDS",
    }
}

/// Errors raised by the bounded-degree edge heap.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum HeapError {
    /// The heap was pre-sized for fewer edges than were pushed.
    #[error("edge heap capacity {capacity} exhausted")]
    CapacityExceeded {
        /// Fixed capacity chosen at construction.
        capacity: usize,
    },
    /// The edge is already queued.
    #[error("edge {edge} is already queued")]
    AlreadyQueued {
        /// Handle of the duplicated edge.
        edge: EdgeId,
    },
    /// The edge is not currently queued.
    #[error("edge {edge} is not queued")]
    NotQueued {
        /// Handle of the missing edge.
        edge: EdgeId,
    },
}

define_error_codes! {
    /// Stable codes describing [`HeapError`] variants.
    enum HeapErrorCode for HeapError {
        /// The heap was pre-sized for fewer edges than were pushed.
        CapacityExceeded => CapacityExceeded { .. } => "HEAP_CAPACITY_EXCEEDED",
        /// The edge is already queued.
        AlreadyQueued => AlreadyQueued { .. } => "HEAP_ALREADY_QUEUED",
        /// The edge is not currently queued.
        NotQueued => NotQueued { .. } => "HEAP_NOT_QUEUED",
    }
}

/// Precondition violations detected by the region graph.
///
/// Every variant indicates a logic error in the caller or a corrupted graph;
/// none of them is recoverable by retrying.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum GraphError {
    /// The handle does not name a region of this graph.
    #[error("region {region} does not exist in a graph of {len} regions")]
    UnknownRegion {
        /// Offending handle.
        region: RegionId,
        /// Number of regions in the arena.
        len: usize,
    },
    /// The region has already been absorbed.
    #[error("region {region} is no longer live (absorbed by {absorbed_by:?})")]
    DeadRegion {
        /// Offending handle.
        region: RegionId,
        /// Region that absorbed it, if recorded.
        absorbed_by: Option<RegionId>,
    },
    /// A region cannot be linked to or absorb itself.
    #[error("region {region} cannot be paired with itself")]
    SelfReference {
        /// Offending handle.
        region: RegionId,
    },
    /// The adjacency already exists.
    #[error("region {region} is already linked to {neighbour}")]
    DuplicateLink {
        /// Region owning the adjacency list.
        region: RegionId,
        /// Neighbour that is already present.
        neighbour: RegionId,
    },
    /// The adjacency was expected but is missing.
    #[error("region {region} has no link to {neighbour}")]
    MissingLink {
        /// Region owning the adjacency list.
        region: RegionId,
        /// Neighbour that was expected.
        neighbour: RegionId,
    },
    /// The two regions disagree on the number of channels they accumulate.
    #[error("region accumulates {expected} channels but {actual} were supplied")]
    ChannelMismatch {
        /// Channels tracked by the region.
        expected: usize,
        /// Channels supplied by the caller.
        actual: usize,
    },
    /// The edge handle does not name a live edge.
    #[error("edge {edge} is unknown or retired")]
    UnknownEdge {
        /// Offending handle.
        edge: EdgeId,
    },
}

define_error_codes! {
    /// Stable codes describing [`GraphError`] variants.
    enum GraphErrorCode for GraphError {
        /// The handle does not name a region of this graph.
        UnknownRegion => UnknownRegion { .. } => "GRAPH_UNKNOWN_REGION",
        /// The region has already been absorbed.
        DeadRegion => DeadRegion { .. } => "GRAPH_DEAD_REGION",
        /// A region cannot be linked to or absorb itself.
        SelfReference => SelfReference { .. } => "GRAPH_SELF_REFERENCE",
        /// The adjacency already exists.
        DuplicateLink => DuplicateLink { .. } => "GRAPH_DUPLICATE_LINK",
        /// The adjacency was expected but is missing.
        MissingLink => MissingLink { .. } => "GRAPH_MISSING_LINK",
        /// The regions disagree on channel count.
        ChannelMismatch => ChannelMismatch { .. } => "GRAPH_CHANNEL_MISMATCH",
        /// The edge handle does not name a live edge.
        UnknownEdge => UnknownEdge { .. } => "GRAPH_UNKNOWN_EDGE",
    }
}

/// Error type produced when constructing or driving a [`crate::Segmentator`].
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SegmentationError {
    /// The configuration was rejected by the builder.
    #[error("invalid segmentation config: {reason}")]
    InvalidConfig {
        /// Human-readable description of the rejected setting.
        reason: String,
    },
    /// The pixel buffer or label raster was malformed.
    #[error(transparent)]
    Raster(#[from] RasterError),
    /// The edge heap rejected an operation.
    #[error(transparent)]
    Heap(#[from] HeapError),
    /// The region graph detected a precondition violation.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// An explicit merge named two regions that do not share a border.
    #[error("regions {left} and {right} are not adjacent")]
    NotAdjacent {
        /// First region named by the caller.
        left: RegionId,
        /// Second region named by the caller.
        right: RegionId,
    },
    /// An explicit merge touched a region or edge blocked by the locking policy.
    #[error("merge between {left} and {right} is blocked by the locking policy")]
    Locked {
        /// First region named by the caller.
        left: RegionId,
        /// Second region named by the caller.
        right: RegionId,
    },
    /// A cost function produced a NaN or infinite merge cost.
    #[error("cost function `{cost}` returned a non-finite cost for ({left}, {right})")]
    NonFiniteCost {
        /// Name of the cost function.
        cost: String,
        /// First region of the pair.
        left: RegionId,
        /// Second region of the pair.
        right: RegionId,
    },
}

define_error_codes! {
    /// Stable codes describing [`SegmentationError`] variants.
    enum SegmentationErrorCode for SegmentationError {
        /// The configuration was rejected by the builder.
        InvalidConfig => InvalidConfig { .. } => "SEGMENTATION_INVALID_CONFIG",
        /// The pixel buffer or label raster was malformed.
        Raster => Raster(..) => "SEGMENTATION_RASTER",
        /// The edge heap rejected an operation.
        Heap => Heap(..) => "SEGMENTATION_HEAP",
        /// The region graph detected a precondition violation.
        Graph => Graph(..) => "SEGMENTATION_GRAPH",
        /// An explicit merge named two regions that do not share a border.
        NotAdjacent => NotAdjacent { .. } => "SEGMENTATION_NOT_ADJACENT",
        /// An explicit merge was blocked by the locking policy.
        Locked => Locked { .. } => "SEGMENTATION_LOCKED",
        /// A cost function produced a non-finite merge cost.
        NonFiniteCost => NonFiniteCost { .. } => "SEGMENTATION_NON_FINITE_COST",
    }
}

impl SegmentationError {
    /// Retrieve the inner [`GraphErrorCode`] when the failure came from the region graph.
    #[must_use]
    pub const fn graph_code(&self) -> Option<GraphErrorCode> {
        match self {
            Self::Graph(error) => Some(error.code()),
            _ => None,
        }
    }
}

/// Convenient alias for results returned by the orchestration API.
pub type Result<T> = core::result::Result<T, SegmentationError>;
