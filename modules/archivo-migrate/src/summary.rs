use std::collections::BTreeMap;
use std::fmt;

use crate::layout::SiteLayout;
use crate::types::LegacyPost;

/// What a dry run found, without touching any backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunSummary {
    pub years: Vec<i32>,
    pub total_posts: usize,
    /// `(post_id, site-relative image path)` for posts with a usable image.
    pub with_image: Vec<(String, String)>,
    /// `(post_id, image_src)` for references with no file behind them.
    pub missing_images: Vec<(String, String)>,
    pub per_year: BTreeMap<i32, usize>,
}

impl DryRunSummary {
    pub fn build(years: &[i32], posts: &[LegacyPost], layout: &SiteLayout) -> Self {
        let mut per_year = BTreeMap::new();
        for post in posts {
            *per_year.entry(post.year).or_insert(0) += 1;
        }

        let with_image = posts
            .iter()
            .filter_map(|post| {
                let path = post.local_image_path.as_deref()?;
                Some((post.post_id.clone(), layout.relative(path)))
            })
            .collect();
        let missing_images = posts
            .iter()
            .filter(|post| post.has_missing_image())
            .map(|post| (post.post_id.clone(), post.image_src.clone()))
            .collect();

        Self {
            years: years.to_vec(),
            total_posts: posts.len(),
            with_image,
            missing_images,
            per_year,
        }
    }
}

impl fmt::Display for DryRunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let years: Vec<String> = self.years.iter().map(i32::to_string).collect();

        writeln!(f, "Dry run complete.")?;
        writeln!(f, "- Years: {}", years.join(", "))?;
        writeln!(f, "- Posts found: {}", self.total_posts)?;
        writeln!(f, "- Posts with a local image: {}", self.with_image.len())?;
        writeln!(f, "- Missing images: {}", self.missing_images.len())?;
        write!(f, "- Posts per year:")?;
        for (year, count) in &self.per_year {
            write!(f, "\n  {year}: {count}")?;
        }

        if !self.with_image.is_empty() {
            write!(f, "\n- Image associations:")?;
            for (post_id, path) in &self.with_image {
                write!(f, "\n  {post_id} -> {path}")?;
            }
        }
        if !self.missing_images.is_empty() {
            write!(f, "\n- Image warnings:")?;
            for (post_id, src) in &self.missing_images {
                write!(f, "\n  {post_id} -> missing {src}")?;
            }
        }
        Ok(())
    }
}
