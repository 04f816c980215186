pub mod format;
mod idalloc;
use ash::vk;
pub use idalloc::IdAlloc;

/// Intersects `rect` with the image extent. Returns `None` if nothing of the rect is left.
pub fn clip_rect(rect: vk::Rect2D, extent: vk::Extent2D) -> Option<vk::Rect2D> {
    let image_max = glam::IVec2::new(
        extent.width.min(i32::MAX as u32) as i32,
        extent.height.min(i32::MAX as u32) as i32,
    );
    let min = glam::IVec2::new(rect.offset.x, rect.offset.y).max(glam::IVec2::ZERO);
    let max = glam::IVec2::new(rect.offset.x, rect.offset.y)
        .saturating_add(
            glam::UVec2::new(rect.extent.width, rect.extent.height)
                .min(glam::UVec2::splat(i32::MAX as u32))
                .as_ivec2(),
        )
        .min(image_max);
    if max.x <= min.x || max.y <= min.y {
        return None;
    }
    let size = (max - min).as_uvec2();
    Some(vk::Rect2D {
        offset: vk::Offset2D { x: min.x, y: min.y },
        extent: vk::Extent2D {
            width: size.x,
            height: size.y,
        },
    })
}

/// Returns true if `rect` covers the whole image.
pub fn covers_extent(rect: vk::Rect2D, extent: vk::Extent2D) -> bool {
    clip_rect(rect, extent).is_some_and(|clipped| {
        clipped.offset.x == 0 && clipped.offset.y == 0 && clipped.extent == extent
    })
}
