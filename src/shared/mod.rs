pub mod progressbar;
