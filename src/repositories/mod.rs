pub(crate) mod drafts;
pub(crate) mod jobs;
pub(crate) mod results;
