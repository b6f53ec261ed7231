/*

SmartIR combination-matrix learner
----------------------------------

Template json -> profile/axes -> combination walk -> IR capture -> command tree

The session controller pulls combinations from the enumerator, asks the skip
policy whether a capture is needed, reads codes through the transceiver seam
and checkpoints partial progress so an interrupted session resumes where it
stopped.

*/

pub mod checkpoint;
pub mod codecs;
pub mod combinations;
pub mod device;
pub mod profile;
pub mod session;
pub mod skip;
pub mod tree;
