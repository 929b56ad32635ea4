//! The deformable terrain object and its step pipeline.

use std::fmt;
use std::path::Path;

use nalgebra::{Point3, Vector3};
use scm_grid::{BaseSurface, NodeRecord, NodeStore, TriMesh};
use scm_types::{
    Aabb, BodyId, BulldozingParams, FeaNodeId, GridCoord, Pose, Result, SoilParams, SoilSampler,
    SurfaceId, TerrainError,
};
use tracing::warn;

use crate::bulldozing;
use crate::domain::ActiveDomain;
use crate::forces::{self, ForceAccumulators};
use crate::host::{CollisionQuery, LoadSink};
use crate::patch;
use crate::raycast::{self, HitMap};
use crate::timers::Timers;
use crate::viz::{Colormap, PlotType, TerrainMesh};

/// Soil state at a grid node, as reported by [`ScmTerrain::node_info`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeInfo {
    /// Total sinkage along the local normal.
    pub sinkage: f64,
    /// Plastic part of the sinkage.
    pub sinkage_plastic: f64,
    /// Elastic part of the sinkage.
    pub sinkage_elastic: f64,
    /// Normal pressure.
    pub sigma: f64,
    /// Yield pressure.
    pub sigma_yield: f64,
    /// Accumulated Janosi shear displacement.
    pub kshear: f64,
    /// Shear traction.
    pub tau: f64,
}

/// Counters and stage timings of the last step.
///
/// The `Display` impl prints the aligned block used by the embedding demos.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepStats {
    /// Rays cast into the collision world.
    pub num_ray_casts: usize,
    /// Rays that hit a collision shape.
    pub num_ray_hits: usize,
    /// Contact patches segmented from the hits.
    pub num_contact_patches: usize,
    /// Cells in the bulldozing erosion domain.
    pub num_erosion_nodes: usize,
    /// Active-domain resolution time, ms.
    pub timer_active_domains: f64,
    /// Per-domain ray testing time, ms.
    pub timer_ray_testing: f64,
    /// Total ray-casting stage time, ms.
    pub timer_ray_casting: f64,
    /// Patch segmentation time, ms.
    pub timer_contact_patches: f64,
    /// Constitutive update and force accumulation time, ms.
    pub timer_contact_forces: f64,
    /// Total bulldozing time, ms.
    pub timer_bulldozing: f64,
    /// Bulldozing stage 1 (boundary raise) time, ms.
    pub timer_bulldozing_boundary: f64,
    /// Bulldozing stage 2 (domain dilation) time, ms.
    pub timer_bulldozing_domain: f64,
    /// Bulldozing stage 3 (erosion smoothing) time, ms.
    pub timer_bulldozing_erosion: f64,
    /// Visualization update time, ms.
    pub timer_visualization: f64,
}

impl fmt::Display for StepStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " Timers (ms):")?;
        writeln!(f, "   Moving patches:          {}", self.timer_active_domains)?;
        writeln!(f, "   Ray testing:             {}", self.timer_ray_testing)?;
        writeln!(f, "   Ray casting:             {}", self.timer_ray_casting)?;
        writeln!(f, "   Contact patches:         {}", self.timer_contact_patches)?;
        writeln!(f, "   Contact forces:          {}", self.timer_contact_forces)?;
        writeln!(f, "   Bulldozing:              {}", self.timer_bulldozing)?;
        writeln!(f, "      Raise boundary:       {}", self.timer_bulldozing_boundary)?;
        writeln!(f, "      Compute domain:       {}", self.timer_bulldozing_domain)?;
        writeln!(f, "      Apply erosion:        {}", self.timer_bulldozing_erosion)?;
        writeln!(f, "   Visualization:           {}", self.timer_visualization)?;
        writeln!(f, " Counters:")?;
        writeln!(f, "   Number ray casts:        {}", self.num_ray_casts)?;
        writeln!(f, "   Number ray hits:         {}", self.num_ray_hits)?;
        writeln!(f, "   Number contact patches:  {}", self.num_contact_patches)?;
        writeln!(f, "   Number erosion nodes:    {}", self.num_erosion_nodes)
    }
}

type FrictionFn = dyn Fn(&Point3<f64>) -> f64 + Send + Sync;

/// Deformable terrain based on the Soil Contact Model.
///
/// Owns the sparse grid, the visualization mesh, and the per-step force
/// accumulators for its whole lifetime. The terrain is advanced exactly once
/// per host integrator step through [`advance`](Self::advance); the per-node
/// plastic state carries all history the model uses, so the terrain is safely
/// re-entrant across time points but not reversible.
pub struct ScmTerrain {
    frame: Pose,
    store: NodeStore,
    soil: SoilParams,
    soil_sampler: Option<Box<dyn SoilSampler>>,
    friction_fn: Option<Box<FrictionFn>>,
    bulldozing_enabled: bool,
    bulldozing: BulldozingParams,
    boundary: Option<Aabb>,
    domains: Vec<ActiveDomain>,
    user_domains: bool,
    test_offset_up: f64,
    test_offset_down: f64,
    cosim_mode: bool,
    mesh: Option<TerrainMesh>,
    colormap: Colormap,
    plot_type: PlotType,
    plot_v_min: f64,
    plot_v_max: f64,
    accum: ForceAccumulators,
    timers: Timers,
    num_ray_casts: usize,
    num_ray_hits: usize,
    num_contact_patches: usize,
    num_erosion_nodes: usize,
    external_modified: Vec<u32>,
}

impl ScmTerrain {
    /// Default floor offset for mesh-based initialization: cells outside the
    /// mesh projection sit this far below the mesh minimum.
    pub const DEFAULT_BASE_LEVEL: f64 = -1000.0;

    fn from_base(base: BaseSurface, visualization_mesh: bool) -> Self {
        let frame = Pose::identity();
        let mesh = visualization_mesh.then(|| TerrainMesh::build(&base, &frame));
        Self {
            frame,
            store: NodeStore::new(base),
            soil: SoilParams::default(),
            soil_sampler: None,
            friction_fn: None,
            bulldozing_enabled: false,
            bulldozing: BulldozingParams::default(),
            boundary: None,
            domains: Vec::new(),
            user_domains: false,
            test_offset_up: 0.1,
            test_offset_down: 0.5,
            cosim_mode: false,
            mesh,
            colormap: Colormap,
            plot_type: PlotType::None,
            plot_v_min: 0.0,
            plot_v_max: 0.2,
            accum: ForceAccumulators::default(),
            timers: Timers::default(),
            num_ray_casts: 0,
            num_ray_hits: 0,
            num_contact_patches: 0,
            num_erosion_nodes: 0,
            external_modified: Vec::new(),
        }
    }

    /// Flat rectangular patch at height zero.
    pub fn flat(size_x: f64, size_y: f64, delta: f64, visualization_mesh: bool) -> Result<Self> {
        Ok(Self::from_base(
            BaseSurface::flat(size_x, size_y, delta)?,
            visualization_mesh,
        ))
    }

    /// Patch initialized from a gray-scale heightmap image.
    pub fn from_heightmap(
        path: impl AsRef<Path>,
        size_x: f64,
        size_y: f64,
        h_min: f64,
        h_max: f64,
        delta: f64,
        visualization_mesh: bool,
    ) -> Result<Self> {
        Ok(Self::from_base(
            BaseSurface::from_heightmap(path, size_x, size_y, h_min, h_max, delta)?,
            visualization_mesh,
        ))
    }

    /// Patch initialized from a triangle mesh.
    ///
    /// `base_level` is the floor offset for grid cells outside the mesh
    /// projection; [`Self::DEFAULT_BASE_LEVEL`] matches the usual choice.
    pub fn from_mesh(
        mesh: &TriMesh,
        delta: f64,
        base_level: f64,
        visualization_mesh: bool,
    ) -> Result<Self> {
        Ok(Self::from_base(
            BaseSurface::from_trimesh(mesh, delta, base_level)?,
            visualization_mesh,
        ))
    }

    /// Patch initialized from a Wavefront OBJ file.
    pub fn from_mesh_file(
        path: impl AsRef<Path>,
        delta: f64,
        base_level: f64,
        visualization_mesh: bool,
    ) -> Result<Self> {
        let mesh = TriMesh::from_obj_file(path)?;
        Self::from_mesh(&mesh, delta, base_level, visualization_mesh)
    }

    /// Set the SCM reference frame; deformation occurs along its local +Z.
    ///
    /// The visualization mesh is rebuilt from the base surface in the new
    /// frame; already-deformed cells refresh on their next modification.
    pub fn set_reference_frame(&mut self, frame: Pose) {
        self.frame = frame;
        if let Some(old) = &self.mesh {
            let wireframe = old.is_wireframe();
            let mut mesh = TerrainMesh::build(self.store.base(), &self.frame);
            mesh.set_wireframe(wireframe);
            self.mesh = Some(mesh);
        }
    }

    /// The current SCM reference frame.
    #[must_use]
    pub fn reference_frame(&self) -> &Pose {
        &self.frame
    }

    /// Set the soil model constants.
    ///
    /// The friction angle is in degrees. `elastic_k` must exceed
    /// `bekker_kphi` and is clamped up to it otherwise; a very large
    /// `elastic_k` with `damping_r = 0` recovers the original rigid-plastic
    /// SCM response.
    #[allow(clippy::too_many_arguments)]
    pub fn set_soil_parameters(
        &mut self,
        bekker_kphi: f64,
        bekker_kc: f64,
        bekker_n: f64,
        mohr_cohesion: f64,
        mohr_friction_deg: f64,
        janosi_shear: f64,
        elastic_k: f64,
        damping_r: f64,
    ) {
        self.soil = SoilParams::new(
            bekker_kphi,
            bekker_kc,
            bekker_n,
            mohr_cohesion,
            mohr_friction_deg,
            janosi_shear,
            elastic_k,
            damping_r,
        );
    }

    /// The current global soil parameters.
    #[must_use]
    pub fn soil_parameters(&self) -> &SoilParams {
        &self.soil
    }

    /// Enable or disable the bulldozing heuristic.
    pub fn enable_bulldozing(&mut self, enabled: bool) {
        self.bulldozing_enabled = enabled;
    }

    /// Set the bulldozing parameters; the erosion angle is in degrees.
    pub fn set_bulldozing_parameters(
        &mut self,
        erosion_angle_deg: f64,
        flow_factor: f64,
        erosion_iterations: usize,
        erosion_propagations: usize,
    ) {
        self.bulldozing = BulldozingParams::new(
            erosion_angle_deg,
            flow_factor,
            erosion_iterations,
            erosion_propagations,
        );
    }

    /// Restrict ray testing to a rectangular boundary (SCM-frame x-y).
    ///
    /// An inverted box is ignored with a warning.
    pub fn set_boundary(&mut self, aabb: Aabb) {
        if aabb.is_inverted() {
            warn!("ignoring inverted terrain boundary AABB");
            return;
        }
        self.boundary = Some(aabb);
    }

    /// Add an active domain: an oriented box attached to a body, given by its
    /// center and full dimensions in the body reference frame. When at least
    /// one user domain exists, only user domains are ray tested; otherwise a
    /// default domain tracking the collision world's bounds is used.
    pub fn add_active_domain(&mut self, body: BodyId, center: Vector3<f64>, dims: Vector3<f64>) {
        self.domains.push(ActiveDomain::attached(body, center, dims));
        self.user_domains = true;
    }

    /// Register location-dependent soil parameters.
    pub fn register_soil_sampler(&mut self, sampler: impl SoilSampler + 'static) {
        self.soil_sampler = Some(Box::new(sampler));
    }

    /// Register a location-dependent friction coefficient for rigid-terrain
    /// interoperability queries.
    pub fn set_friction_function(
        &mut self,
        f: impl Fn(&Point3<f64>) -> f64 + Send + Sync + 'static,
    ) {
        self.friction_fn = Some(Box::new(f));
    }

    /// Terrain friction coefficient at a world location (0.8 when no
    /// friction functor is registered).
    #[must_use]
    pub fn coefficient_friction(&self, loc: &Point3<f64>) -> f64 {
        self.friction_fn.as_ref().map_or(0.8, |f| f(loc))
    }

    /// Offset above the terrain from which test rays start.
    pub fn set_test_height(&mut self, offset: f64) {
        self.test_offset_up = offset;
    }

    /// The current test-ray start offset.
    #[must_use]
    pub fn test_height(&self) -> f64 {
        self.test_offset_up
    }

    /// In co-simulation mode loads are not handed to the sink; the
    /// accumulated forces stay queryable through
    /// [`Self::contact_force_body`] and its node/surface counterparts.
    pub fn set_cosimulation_mode(&mut self, enabled: bool) {
        self.cosim_mode = enabled;
    }

    /// Select the false-coloring field and its value range.
    pub fn set_plot_type(&mut self, plot_type: PlotType, v_min: f64, v_max: f64) {
        self.plot_type = plot_type;
        self.plot_v_min = v_min;
        self.plot_v_max = v_max;
    }

    /// Render the visualization mesh as wireframe (skips normal smoothing).
    pub fn set_mesh_wireframe(&mut self, wireframe: bool) {
        if let Some(mesh) = &mut self.mesh {
            mesh.set_wireframe(wireframe);
        }
    }

    /// The visualization mesh, if one was requested at construction.
    #[must_use]
    pub fn mesh(&self) -> Option<&TerrainMesh> {
        self.mesh.as_ref()
    }

    /// Write the visualization mesh as a Wavefront OBJ file.
    pub fn write_obj(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        match &self.mesh {
            Some(mesh) => mesh.write_obj(path),
            None => Err(TerrainError::write(
                path.display().to_string(),
                "visualization mesh not created",
            )),
        }
    }

    /// Read access to the sparse node store.
    #[must_use]
    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    /// Grid spacing.
    #[must_use]
    pub fn delta(&self) -> f64 {
        self.store.base().delta()
    }

    /// Advance the terrain by one host integrator step.
    ///
    /// Runs the full pipeline -- active domains, parallel ray casting, patch
    /// segmentation, constitutive update, force distribution, bulldozing and
    /// visualization -- and hands the accumulated loads to `sink` unless
    /// co-simulation mode is active. `dt` is the host step size, used for
    /// shear accumulation and plastic flow rates.
    pub fn advance<W, S>(&mut self, dt: f64, world: &W, sink: &mut S)
    where
        W: CollisionQuery + ?Sized,
        S: LoadSink + ?Sized,
    {
        let delta = self.store.base().delta();

        // Start from any externally modified vertices (checkpoint restore)
        let mut modified_vertices = std::mem::take(&mut self.external_modified);

        // Reset transients on the nodes modified last step; refresh their
        // colors so released cells do not keep stale pressure coloring
        let prev_modified = self.store.drain_modified();
        for ij in prev_modified {
            let Some(nr) = self.store.get_mut(ij) else {
                continue;
            };
            nr.reset_step();
            if let Some(mesh) = &mut self.mesh {
                if mesh.in_bounds(ij) {
                    let iv = mesh.vertex_index(ij) as u32;
                    let nr = &*nr;
                    mesh.update_vertex(
                        ij,
                        nr,
                        &self.frame,
                        self.plot_type,
                        &self.colormap,
                        self.plot_v_min,
                        self.plot_v_max,
                    );
                    modified_vertices.push(iv);
                }
            }
        }

        self.timers.reset_all();
        self.num_ray_casts = 0;
        self.num_ray_hits = 0;
        self.num_contact_patches = 0;
        self.num_erosion_nodes = 0;
        self.accum.clear();

        // ------------------------
        // Resolve active domains
        // ------------------------
        self.timers.active_domains.start();
        let z_world = self.frame.up();
        if self.user_domains {
            for d in &mut self.domains {
                d.update_user(world, &self.frame, &z_world, delta);
            }
        } else {
            if self.domains.is_empty() {
                self.domains.push(ActiveDomain::default_domain());
            }
            let aabb = world.collision_bounds();
            self.domains[0].update_default(&aabb, &self.frame, delta);
        }
        self.timers.active_domains.stop();

        // ------------------------
        // Parallel ray casting
        // ------------------------
        self.timers.ray_casting.start();
        let mut hits = HitMap::new();
        for d in &self.domains {
            self.timers.ray_testing.start();
            let body_frame = d.body.map(|b| world.body_ref_frame(b));
            let (d_hits, casts) = raycast::cast_domain(
                world,
                &self.store,
                &self.frame,
                &z_world,
                d,
                body_frame.as_ref(),
                self.boundary.as_ref(),
                self.test_offset_up,
                self.test_offset_down,
            );
            self.timers.ray_testing.stop();

            self.num_ray_casts += casts;
            // Serial merge: materialize node records for first-time hits
            hits.reserve(d_hits.len());
            for (ij, rec) in d_hits {
                self.store.ensure(ij);
                hits.insert(ij, rec);
            }
        }
        self.num_ray_hits = hits.len();
        self.timers.ray_casting.stop();

        // ------------------------
        // Contact patches
        // ------------------------
        self.timers.contact_patches.start();
        let (patches, patch_of) = patch::segment(&hits, delta);
        self.num_contact_patches = patches.len();
        self.timers.contact_patches.stop();

        // ------------------------
        // Constitutive update and force distribution
        // ------------------------
        self.timers.contact_forces.start();
        forces::compute_contact_forces(
            world,
            dt,
            &self.frame,
            &self.soil,
            self.soil_sampler.as_deref(),
            &mut self.store,
            &hits,
            &patch_of,
            &patches,
            &mut self.accum,
        );
        if !self.cosim_mode {
            for (&body, &(force, torque)) in &self.accum.bodies {
                sink.body_load(body, force, torque);
            }
            for (&node, &force) in &self.accum.nodes {
                sink.node_load(node, force);
            }
            for (&surf, &force) in &self.accum.surfaces {
                // TODO: derive the parametric application point from the hit
                // location instead of the patch midpoint
                sink.surface_load(surf, force, (0.5, 0.5));
            }
        }
        self.timers.contact_forces.stop();

        // ------------------------
        // Bulldozing
        // ------------------------
        self.timers.bulldozing.start();
        if self.bulldozing_enabled {
            self.num_erosion_nodes =
                bulldozing::apply(&mut self.store, &patches, &self.bulldozing, dt, &mut self.timers);
        }
        self.timers.bulldozing.stop();

        // ------------------------
        // Visualization
        // ------------------------
        self.timers.visualization.start();
        if let Some(mesh) = &mut self.mesh {
            for &ij in self.store.modified() {
                if !mesh.in_bounds(ij) {
                    continue; // cells outside the mesh deform invisibly
                }
                let Some(nr) = self.store.get(ij) else { continue };
                let iv = mesh.vertex_index(ij) as u32;
                mesh.update_vertex(
                    ij,
                    nr,
                    &self.frame,
                    self.plot_type,
                    &self.colormap,
                    self.plot_v_min,
                    self.plot_v_max,
                );
                modified_vertices.push(iv);
                if !mesh.is_wireframe() {
                    mesh.update_normal(ij);
                }
            }
            mesh.set_modified(modified_vertices);
        }
        self.timers.visualization.stop();
    }

    /// Terrain height (world frame) below a world location.
    #[must_use]
    pub fn height(&self, loc: &Point3<f64>) -> f64 {
        let (mut loc_loc, ij) = self.snap(loc);
        loc_loc.z = self.store.height(ij);
        self.frame.transform_point(&loc_loc).z
    }

    /// Undeformed terrain height (world frame) below a world location.
    #[must_use]
    pub fn init_height(&self, loc: &Point3<f64>) -> f64 {
        let (mut loc_loc, ij) = self.snap(loc);
        loc_loc.z = self.store.base().init_height(ij);
        self.frame.transform_point(&loc_loc).z
    }

    /// Terrain normal (world frame) at the point below a world location.
    #[must_use]
    pub fn normal(&self, loc: &Point3<f64>) -> Vector3<f64> {
        let (_, ij) = self.snap(loc);
        self.frame.transform_vector(&self.store.normal(ij))
    }

    /// Undeformed terrain normal (world frame) below a world location.
    #[must_use]
    pub fn init_normal(&self, loc: &Point3<f64>) -> Vector3<f64> {
        let (_, ij) = self.snap(loc);
        self.frame.transform_vector(&self.store.base().init_normal(ij))
    }

    /// Soil state at the grid node closest to a world location.
    ///
    /// Untouched nodes report all-zero state.
    #[must_use]
    pub fn node_info(&self, loc: &Point3<f64>) -> NodeInfo {
        let (_, ij) = self.snap(loc);
        match self.store.get(ij) {
            Some(nr) => NodeInfo {
                sinkage: nr.sinkage,
                sinkage_plastic: nr.sinkage_plastic,
                sinkage_elastic: nr.sinkage_elastic,
                sigma: nr.sigma,
                sigma_yield: nr.sigma_yield,
                kshear: nr.kshear,
                tau: nr.tau,
            },
            None => NodeInfo::default(),
        }
    }

    fn snap(&self, loc: &Point3<f64>) -> (Point3<f64>, GridCoord) {
        let loc_loc = self.frame.inverse_transform_point(loc);
        let delta = self.store.base().delta();
        let ij = GridCoord::new(
            (loc_loc.x / delta).round() as i32,
            (loc_loc.y / delta).round() as i32,
        );
        (loc_loc, ij)
    }

    /// Heights of modified grid nodes: every touched node when `all_nodes`,
    /// otherwise only the nodes modified during the last step.
    #[must_use]
    pub fn modified_nodes(&self, all_nodes: bool) -> Vec<(GridCoord, f64)> {
        if all_nodes {
            self.store.iter().map(|(ij, nr)| (ij, nr.level)).collect()
        } else {
            self.store
                .modified()
                .iter()
                .map(|&ij| (ij, self.store.height(ij)))
                .collect()
        }
    }

    /// Bulk-overwrite node heights, e.g. to restore a checkpoint recorded
    /// with [`modified_nodes`](Self::modified_nodes).
    ///
    /// This is a documented lossy restore: only `level` is reinstated;
    /// `level_initial` is reset to the same value, the normal is re-derived
    /// from the base surface, and all plastic/shear history is cleared.
    pub fn set_modified_nodes(&mut self, nodes: &[(GridCoord, f64)]) {
        for &(ij, level) in nodes {
            let normal = self.store.base().init_normal(ij);
            self.store.insert(ij, NodeRecord::new(level, level, normal));
        }
        if let Some(mesh) = &mut self.mesh {
            for &(ij, _) in nodes {
                if !mesh.in_bounds(ij) {
                    continue;
                }
                let Some(nr) = self.store.get(ij) else { continue };
                mesh.update_vertex(
                    ij,
                    nr,
                    &self.frame,
                    self.plot_type,
                    &self.colormap,
                    self.plot_v_min,
                    self.plot_v_max,
                );
                if !mesh.is_wireframe() {
                    mesh.update_normal(ij);
                }
                self.external_modified.push(mesh.vertex_index(ij) as u32);
            }
        }
    }

    /// Accumulated terrain force and torque on a rigid body over the last
    /// step, or `None` if the body was not in contact.
    #[must_use]
    pub fn contact_force_body(&self, body: BodyId) -> Option<(Vector3<f64>, Vector3<f64>)> {
        self.accum.bodies.get(&body).copied()
    }

    /// Accumulated terrain force on an FEA node over the last step.
    #[must_use]
    pub fn contact_force_node(&self, node: FeaNodeId) -> Option<Vector3<f64>> {
        self.accum.nodes.get(&node).copied()
    }

    /// Accumulated terrain force on a loadable surface over the last step.
    #[must_use]
    pub fn contact_force_surface(&self, surface: SurfaceId) -> Option<Vector3<f64>> {
        self.accum.surfaces.get(&surface).copied()
    }

    /// Rays cast during the last step.
    #[must_use]
    pub fn num_ray_casts(&self) -> usize {
        self.num_ray_casts
    }

    /// Ray hits during the last step.
    #[must_use]
    pub fn num_ray_hits(&self) -> usize {
        self.num_ray_hits
    }

    /// Contact patches segmented during the last step.
    #[must_use]
    pub fn num_contact_patches(&self) -> usize {
        self.num_contact_patches
    }

    /// Erosion-domain size of the last step (zero with bulldozing disabled).
    #[must_use]
    pub fn num_erosion_nodes(&self) -> usize {
        self.num_erosion_nodes
    }

    /// Counters and stage timings of the last step.
    #[must_use]
    pub fn stats(&self) -> StepStats {
        StepStats {
            num_ray_casts: self.num_ray_casts,
            num_ray_hits: self.num_ray_hits,
            num_contact_patches: self.num_contact_patches,
            num_erosion_nodes: self.num_erosion_nodes,
            timer_active_domains: self.timers.active_domains.ms(),
            timer_ray_testing: self.timers.ray_testing.ms(),
            timer_ray_casting: self.timers.ray_casting.ms(),
            timer_contact_patches: self.timers.contact_patches.ms(),
            timer_contact_forces: self.timers.contact_forces.ms(),
            timer_bulldozing: self.timers.bulldozing.ms(),
            timer_bulldozing_boundary: self.timers.bulldozing_boundary.ms(),
            timer_bulldozing_domain: self.timers.bulldozing_domain.ms(),
            timer_bulldozing_erosion: self.timers.bulldozing_erosion.ms(),
            timer_visualization: self.timers.visualization.ms(),
        }
    }
}

impl fmt::Debug for ScmTerrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScmTerrain")
            .field("delta", &self.delta())
            .field("touched_nodes", &self.store.len())
            .field("bulldozing", &self.bulldozing_enabled)
            .field("cosim_mode", &self.cosim_mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::host::{NullLoadSink, RayHitInfo};
    use scm_types::ContactableId;

    /// A world with no collision geometry at all.
    struct EmptyWorld;

    impl CollisionQuery for EmptyWorld {
        fn ray_hit(&self, _: &Point3<f64>, _: &Point3<f64>) -> Option<RayHitInfo> {
            None
        }
        fn collision_bounds(&self) -> Aabb {
            Aabb::empty()
        }
        fn body_ref_frame(&self, _: BodyId) -> Pose {
            Pose::identity()
        }
        fn body_com(&self, _: BodyId) -> Point3<f64> {
            Point3::origin()
        }
        fn contact_point_speed(
            &self,
            _: ContactableId,
            _: &Point3<f64>,
        ) -> Vector3<f64> {
            Vector3::zeros()
        }
        fn fea_triangle(&self, _: scm_types::TriangleId) -> Option<crate::host::FeaTriangle> {
            None
        }
    }

    #[test]
    fn test_empty_world_step_is_inert() {
        let mut terrain = ScmTerrain::flat(10.0, 10.0, 0.1, false).unwrap();
        terrain.advance(1e-3, &EmptyWorld, &mut NullLoadSink);

        assert_eq!(terrain.num_ray_casts(), 0);
        assert_eq!(terrain.num_ray_hits(), 0);
        assert_eq!(terrain.num_contact_patches(), 0);
        assert!(terrain.store().is_empty());
    }

    #[test]
    fn test_queries_on_untouched_terrain() {
        let terrain = ScmTerrain::flat(10.0, 10.0, 0.1, false).unwrap();
        let loc = Point3::new(1.0, -2.0, 5.0);
        assert_eq!(terrain.height(&loc), 0.0);
        assert_eq!(terrain.init_height(&loc), 0.0);
        assert_eq!(terrain.normal(&loc), Vector3::z());
        assert_eq!(terrain.node_info(&loc), NodeInfo::default());
        assert_eq!(terrain.coefficient_friction(&loc), 0.8);
    }

    #[test]
    fn test_inverted_boundary_ignored() {
        let mut terrain = ScmTerrain::flat(10.0, 10.0, 0.1, false).unwrap();
        terrain.set_boundary(Aabb::new(
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(-1.0, 1.0, 1.0),
        ));
        assert!(terrain.boundary.is_none());
    }

    #[test]
    fn test_set_modified_nodes_restores_height() {
        let mut terrain = ScmTerrain::flat(10.0, 10.0, 0.1, false).unwrap();
        let nodes = vec![
            (GridCoord::new(0, 0), -0.05),
            (GridCoord::new(1, 0), -0.03),
        ];
        terrain.set_modified_nodes(&nodes);

        assert_eq!(terrain.height(&Point3::new(0.0, 0.0, 1.0)), -0.05);
        assert_eq!(terrain.height(&Point3::new(0.1, 0.0, 1.0)), -0.03);
        // the restore is lossy: no plastic history
        let info = terrain.node_info(&Point3::new(0.0, 0.0, 1.0));
        assert_eq!(info.sinkage_plastic, 0.0);
    }

    #[test]
    fn test_stats_display_block() {
        let terrain = ScmTerrain::flat(4.0, 4.0, 0.1, false).unwrap();
        let text = terrain.stats().to_string();
        assert!(text.contains("Number ray casts"));
        assert!(text.contains("Timers (ms)"));
    }

    #[test]
    fn test_reference_frame_shifts_heights() {
        let mut terrain = ScmTerrain::flat(10.0, 10.0, 0.1, false).unwrap();
        terrain.set_reference_frame(Pose::from_position(Point3::new(0.0, 0.0, 2.0)));
        // Flat terrain at frame height 2: world height is 2 everywhere
        assert_eq!(terrain.height(&Point3::new(0.0, 0.0, 10.0)), 2.0);
    }
}
