pub mod morphology;
pub mod profile;
pub mod raster;
pub mod regions;

use profile::activity_profile;
use raster::RasterImage;
use regions::{Region, SegmentParams, segment_regions};

/// Locate the grid of sub-image regions inside `image`.
///
/// Profiles row/column activity, thresholds at `params.std_threshold`,
/// closes short gaps and returns the row x column interval grid.
pub fn find_sub_images(
    image: &RasterImage,
    params: &SegmentParams,
) -> crate::error::Result<Vec<Region>> {
    let profile = activity_profile(image)?;
    segment_regions(&profile, params)
}
