//! Tensor shapes: dimension sizes plus an informational layout tag.

/// Memory layout tag of a tensor.
///
/// The tag describes how a consumer interprets the dimensions; buffer and
/// proxy arithmetic never consult it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Layout {
    #[default]
    Any,
    C,
    CN,
    NC,
    CHW,
    HWC,
    NCHW,
    NHWC,
    NCDHW,
    NDHWC,
    Scalar,
}

impl Layout {
    /// Number of dimensions implied by the layout, or `None` for [`Layout::Any`].
    pub fn rank(self) -> Option<usize> {
        match self {
            Layout::Any => None,
            Layout::Scalar => Some(0),
            Layout::C => Some(1),
            Layout::CN | Layout::NC => Some(2),
            Layout::CHW | Layout::HWC => Some(3),
            Layout::NCHW | Layout::NHWC => Some(4),
            Layout::NCDHW | Layout::NDHWC => Some(5),
        }
    }
}

/// Dimension sizes of a tensor plus its layout tag.
///
/// An empty dimension list means the shape is not yet determined; its element
/// count is zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ShapeDescriptor {
    dims: Vec<usize>,
    layout: Layout,
}

impl ShapeDescriptor {
    pub fn new(dims: impl Into<Vec<usize>>, layout: Layout) -> ShapeDescriptor {
        ShapeDescriptor {
            dims: dims.into(),
            layout,
        }
    }

    /// A shape whose dimensions are not known yet.
    pub fn undetermined(layout: Layout) -> ShapeDescriptor {
        ShapeDescriptor {
            dims: Vec::new(),
            layout,
        }
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Product of the dimensions; zero when the shape is undetermined or any
    /// dimension is zero. Saturates at `usize::MAX` on overflow.
    pub fn element_count(&self) -> usize {
        self.checked_element_count().unwrap_or(usize::MAX)
    }

    /// Product of the dimensions, or `None` if it does not fit in `usize`.
    pub fn checked_element_count(&self) -> Option<usize> {
        if self.dims.is_empty() || self.dims.contains(&0) {
            return Some(0);
        }
        self.dims
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
    }

    /// Whether the element count is known and non-zero.
    pub fn is_determined(&self) -> bool {
        self.element_count() != 0
    }

    pub fn set_dims(&mut self, dims: impl Into<Vec<usize>>) {
        self.dims = dims.into();
    }

    pub fn set_layout(&mut self, layout: Layout) {
        self.layout = layout;
    }
}

impl From<Vec<usize>> for ShapeDescriptor {
    fn from(dims: Vec<usize>) -> Self {
        ShapeDescriptor::new(dims, Layout::Any)
    }
}

impl From<&[usize]> for ShapeDescriptor {
    fn from(dims: &[usize]) -> Self {
        ShapeDescriptor::new(dims, Layout::Any)
    }
}

impl<const N: usize> From<[usize; N]> for ShapeDescriptor {
    fn from(dims: [usize; N]) -> Self {
        ShapeDescriptor::new(dims, Layout::Any)
    }
}
