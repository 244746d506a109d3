//! Pairing videos with prompts inside one folder.
//!
//! 1. A video pairs with the prompt whose stem is equal, ignoring case.
//! 2. A folder holding exactly one video and one prompt pairs them whatever
//!    their names.
//! 3. Everything left over is reported: a video facing several unmatched
//!    prompts is ambiguous, anything else is unmatched.
//!
//! Files named like an earlier output, and conversion copies an earlier run
//! left behind, are never treated as input.

use std::collections::HashMap;

use reelstamp_models::{
    is_converted_copy_name, is_output_name, output_file_name, MatchedPair, NodeKind, RemoteNode,
    SkipReason,
};

/// Pairs found in a folder and the entries that were left out.
#[derive(Debug, Default)]
pub struct FolderMatch {
    pub pairs: Vec<MatchedPair>,
    pub skipped: Vec<(RemoteNode, SkipReason)>,
}

impl FolderMatch {
    /// Output file name for each pair, in pair order, distinct within the
    /// folder ignoring case.
    ///
    /// Pairs whose videos share a stem (`take.mp4`, `take.mov`) keep the
    /// video's extension in the name; anything still clashing after that
    /// gets the video id. The result does not depend on listing order.
    pub fn output_names(&self, suffix: &str) -> Vec<String> {
        let by_stem: Vec<String> = self
            .pairs
            .iter()
            .map(|p| output_file_name(p.video.stem(), suffix))
            .collect();
        let by_name = disambiguate(by_stem, |i| {
            output_file_name(&self.pairs[i].video.name, suffix)
        });

        disambiguate(by_name, |i| {
            let video = &self.pairs[i].video;
            output_file_name(&format!("{}_{}", video.name, video.id), suffix)
        })
    }
}

/// Replace every name that clashes with another (ignoring case) by `fallback`.
fn disambiguate(names: Vec<String>, fallback: impl Fn(usize) -> String) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for name in &names {
        *counts.entry(name.to_lowercase()).or_default() += 1;
    }

    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            if counts[&name.to_lowercase()] > 1 {
                fallback(i)
            } else {
                name
            }
        })
        .collect()
}

/// Match the leaf entries of `folder`.
pub fn match_folder(
    folder: &RemoteNode,
    leaves: Vec<RemoteNode>,
    output_suffix: &str,
) -> FolderMatch {
    let mut result = FolderMatch::default();
    let mut videos = Vec::new();
    let mut prompts = Vec::new();

    for node in leaves {
        if is_converted_copy_name(&node.name) {
            result.skipped.push((node, SkipReason::LeftoverCopy));
            continue;
        }

        match node.kind {
            NodeKind::Video if is_output_name(&node.name, output_suffix) => {
                result.skipped.push((node, SkipReason::PreviousOutput));
            }
            NodeKind::Video => videos.push(node),
            NodeKind::PromptDocument | NodeKind::PromptText => prompts.push(node),
            NodeKind::Folder | NodeKind::Other => {
                result.skipped.push((node, SkipReason::UnsupportedType));
            }
        }
    }

    let make_pair = |video: RemoteNode, prompt: RemoteNode| MatchedPair {
        folder_id: folder.id.clone(),
        folder_name: folder.name.clone(),
        video,
        prompt,
    };

    if videos.len() == 1 && prompts.len() == 1 {
        if let (Some(video), Some(prompt)) = (videos.pop(), prompts.pop()) {
            result.pairs.push(make_pair(video, prompt));
        }
        return result;
    }

    let mut leftover_videos = Vec::new();
    for video in videos {
        let stem = video.stem().to_lowercase();
        match prompts.iter().position(|p| p.stem().to_lowercase() == stem) {
            Some(index) => {
                let prompt = prompts.remove(index);
                result.pairs.push(make_pair(video, prompt));
            }
            None => leftover_videos.push(video),
        }
    }

    let video_reason = if prompts.len() > 1 {
        SkipReason::AmbiguousPrompt
    } else {
        SkipReason::UnmatchedVideo
    };
    result
        .skipped
        .extend(leftover_videos.into_iter().map(|v| (v, video_reason)));
    result
        .skipped
        .extend(prompts.into_iter().map(|p| (p, SkipReason::UnmatchedPrompt)));

    result
}
